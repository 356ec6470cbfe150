//! Error taxonomy (spec §7): per-request validation errors returned from
//! `place_bid`, and transient/fatal errors surfaced from lifecycle methods.

use thiserror::Error;

/// Typed rejection kinds for `place_bid`. These are never logged as
/// failures (§7 propagation policy) — they are part of the normal
/// request/response contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BidError {
    #[error("auction round is not active")]
    NotActive,
    #[error("bid amount must be positive")]
    NonPositive,
    #[error("bid must strictly exceed the current stored bid of {current}")]
    NotHigher { current: u64 },
    #[error("balance insufficient: short by {deficit}")]
    InsufficientFunds { deficit: u64 },
}

/// Errors surfaced from lifecycle operations (`start_round`, `end_round`,
/// `end_auction`, registry `create`/`recover`). A transient I/O failure
/// leaves engine state unchanged; an invariant violation is fatal for the
/// engine instance.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("repository operation failed: {0}")]
    Repository(#[from] RepositoryError),
    #[error("engine invariant violated: {0}")]
    InvariantViolation(String),
    #[error("auction {0} not found")]
    AuctionNotFound(String),
    #[error("operation invalid in current state: {0}")]
    InvalidState(String),
}

/// Opaque transient failure from the abstract repository (spec §6). The
/// engine does not retry internally (§7); it surfaces this to the caller.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RepositoryError(pub String);

impl RepositoryError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
