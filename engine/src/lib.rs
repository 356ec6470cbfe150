//! Sealed-budget, multi-round gift auction engine.
//!
//! See `SPEC_FULL.md` at the workspace root for the full module map. The
//! three core types are [`ledger::BalanceLedger`], [`auction::AuctionEngine`]
//! and [`registry::AuctionRegistry`]; [`repository::Repository`] is the sole
//! seam to durable storage.

pub mod auction;
pub mod bid;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod leaderboard;
pub mod model;
pub mod registry;
pub mod repository;

pub use auction::AuctionEngine;
pub use bid::{AcceptedBid, BidResult};
pub use config::AntiSnipeConfig;
pub use error::{BidError, EngineError, RepositoryError};
pub use events::{EventSink, LoggingSink};
pub use ledger::BalanceLedger;
pub use leaderboard::Leaderboard;
pub use model::{
    AuctionId, AuctionRecord, AuctionStatus, BalanceRecord, Bid, Gift, RoundPlan, User, UserId,
    Winner,
};
pub use registry::AuctionRegistry;
pub use repository::{InMemoryRepository, RepoResult, Repository};
