//! The repository contract (spec §6): the engine's sole external dependency.
//! Durable storage itself is out of scope (§1) — this module defines the
//! abstract trait plus an in-memory implementation used by tests and the
//! `sim` demo (SUPPLEMENT-1, `SPEC_FULL.md`).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::RepositoryError;
use crate::model::{AuctionId, AuctionRecord, AuctionStatus, BalanceRecord, User, UserId, Winner};

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn load_balances(&self) -> RepoResult<Vec<BalanceRecord>>;
    async fn save_balances(&self, records: Vec<BalanceRecord>) -> RepoResult<()>;
    async fn bulk_create_users(&self, users: Vec<User>) -> RepoResult<()>;
    async fn get_all_bot_ids(&self) -> RepoResult<Vec<UserId>>;

    async fn create_auction(&self, record: AuctionRecord) -> RepoResult<()>;
    async fn get_auction(&self, id: &str) -> RepoResult<Option<AuctionRecord>>;
    async fn set_status(&self, id: &str, status: AuctionStatus) -> RepoResult<()>;
    async fn append_winners(&self, id: &str, winners: Vec<Winner>) -> RepoResult<()>;
    async fn finish_auction(&self, id: &str, finished_at: u64) -> RepoResult<()>;
    async fn list_active(&self) -> RepoResult<Vec<AuctionRecord>>;
}

#[derive(Debug, Default)]
struct Inner {
    balances: HashMap<UserId, i64>,
    users: HashMap<UserId, User>,
    auctions: HashMap<AuctionId, AuctionRecord>,
}

/// Simplest faithful implementation of the §6 contract: not a production
/// store, just enough to exercise and demonstrate the engine.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    inner: Mutex<Inner>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn load_balances(&self) -> RepoResult<Vec<BalanceRecord>> {
        Ok(self
            .inner
            .lock()
            .balances
            .iter()
            .map(|(u, b)| (u.clone(), *b))
            .collect())
    }

    async fn save_balances(&self, records: Vec<BalanceRecord>) -> RepoResult<()> {
        let mut inner = self.inner.lock();
        inner.balances = records.into_iter().collect();
        Ok(())
    }

    async fn bulk_create_users(&self, users: Vec<User>) -> RepoResult<()> {
        let mut inner = self.inner.lock();
        for user in users {
            inner.balances.insert(user.id.clone(), user.balance);
            inner.users.insert(user.id.clone(), user);
        }
        Ok(())
    }

    async fn get_all_bot_ids(&self) -> RepoResult<Vec<UserId>> {
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .filter(|u| u.is_bot)
            .map(|u| u.id.clone())
            .collect())
    }

    async fn create_auction(&self, record: AuctionRecord) -> RepoResult<()> {
        let mut inner = self.inner.lock();
        if inner.auctions.contains_key(&record.id) {
            return Err(RepositoryError::new(format!(
                "auction {} already exists",
                record.id
            )));
        }
        inner.auctions.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_auction(&self, id: &str) -> RepoResult<Option<AuctionRecord>> {
        Ok(self.inner.lock().auctions.get(id).cloned())
    }

    async fn set_status(&self, id: &str, status: AuctionStatus) -> RepoResult<()> {
        let mut inner = self.inner.lock();
        let record = inner
            .auctions
            .get_mut(id)
            .ok_or_else(|| RepositoryError::new(format!("auction {id} not found")))?;
        record.status = status;
        Ok(())
    }

    async fn append_winners(&self, id: &str, winners: Vec<Winner>) -> RepoResult<()> {
        let mut inner = self.inner.lock();
        let record = inner
            .auctions
            .get_mut(id)
            .ok_or_else(|| RepositoryError::new(format!("auction {id} not found")))?;
        record.winners.extend(winners);
        Ok(())
    }

    async fn finish_auction(&self, id: &str, finished_at: u64) -> RepoResult<()> {
        let mut inner = self.inner.lock();
        let record = inner
            .auctions
            .get_mut(id)
            .ok_or_else(|| RepositoryError::new(format!("auction {id} not found")))?;
        record.status = AuctionStatus::Finished;
        record.finished_at = Some(finished_at);
        Ok(())
    }

    async fn list_active(&self) -> RepoResult<Vec<AuctionRecord>> {
        Ok(self
            .inner
            .lock()
            .auctions
            .values()
            .filter(|r| matches!(r.status, AuctionStatus::Active))
            .cloned()
            .collect())
    }
}
