//! Wire-level data model shared by the ledger, the engine and the repository
//! contract (spec §3, §6).

use serde::{Deserialize, Serialize};

/// Opaque user identifier. The engine never interprets it beyond equality.
pub type UserId = String;

/// Opaque auction identifier, assigned by the registry on creation.
pub type AuctionId = String;

/// A gift awarded to winners. Immutable once an auction is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gift {
    pub id: String,
    pub name: String,
}

/// One round of an auction's plan: how many winners it produces and how long
/// it runs once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPlan {
    /// `K_r`, the number of winners this round admits. Must be >= 1.
    pub count_of_gifts: u32,
    pub duration_seconds: u64,
}

/// A live bid: `(userId, amount, timestamp)` per spec §3. The engine assigns
/// `timestamp` so that it is strictly increasing across *every* accepted
/// bid, not just per user (§5 "Ordering guarantees") — which also resolves
/// Open Question 3 (§9): amount+timestamp ties cannot occur, so insertion
/// order never needs a separate tie-break field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bid {
    pub amount: u64,
    pub timestamp: u64,
}

/// A winner recorded at round close: `(userId, stars, giftNumber)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub user_id: UserId,
    pub stars: u64,
    /// 1-based global index into the auction's flattened gift sequence.
    pub gift_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    Pending,
    Active,
    Finished,
}

/// The durable auction record (spec §3, §6 persistence layout). Field names
/// are normative; `created_at`/`finished_at` are epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub id: AuctionId,
    pub name: String,
    pub gift: Gift,
    pub plan: Vec<RoundPlan>,
    pub winners: Vec<Winner>,
    pub status: AuctionStatus,
    pub created_at: u64,
    pub finished_at: Option<u64>,
}

/// A user balance snapshot as loaded from / saved to the repository:
/// `loadBalances() -> [(userId, balance)]` (spec §6).
pub type BalanceRecord = (UserId, i64);

/// User record per the persistence layout (spec §6). Identity, auth and
/// deposit/withdrawal flows are out of scope (§1); this is carried purely so
/// `bulkCreateUsers`/`getAllBotIds` have something concrete to operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub balance: i64,
    pub is_bot: bool,
    pub created_at: u64,
    pub last_active_at: u64,
}
