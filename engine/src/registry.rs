//! `AuctionRegistry` (spec §4.3): process-wide directory of live
//! `AuctionEngine` instances, plus crash recovery.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::auction::AuctionEngine;
use crate::error::EngineError;
use crate::events::EventSink;
use crate::model::{AuctionId, Gift, RoundPlan};
use crate::repository::Repository;

pub struct AuctionRegistry {
    repo: Arc<dyn Repository>,
    sink: Arc<dyn EventSink>,
    engines: Mutex<HashMap<AuctionId, Arc<AuctionEngine>>>,
    next_id: Mutex<u64>,
}

impl AuctionRegistry {
    pub fn new(repo: Arc<dyn Repository>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            repo,
            sink,
            engines: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    fn fresh_id(&self) -> AuctionId {
        let mut next = self.next_id.lock();
        let id = format!("auction-{}", *next);
        *next += 1;
        id
    }

    /// `create(name, gift, plan) -> engine` (spec §4.3): persists a new
    /// `pending` record, then constructs and registers an engine for it.
    pub async fn create(
        &self,
        name: String,
        gift: Gift,
        plan: Vec<RoundPlan>,
        created_at: u64,
    ) -> Result<Arc<AuctionEngine>, EngineError> {
        let id = self.fresh_id();
        let engine = AuctionEngine::new(
            id.clone(),
            name,
            gift,
            plan,
            self.repo.clone(),
            self.sink.clone(),
        );
        let record = engine.record_snapshot(created_at);
        self.repo.create_auction(record).await?;
        self.engines.lock().insert(id, engine.clone());
        Ok(engine)
    }

    pub fn get(&self, id: &str) -> Option<Arc<AuctionEngine>> {
        self.engines.lock().get(id).cloned()
    }

    pub fn list(&self) -> Vec<Arc<AuctionEngine>> {
        self.engines.lock().values().cloned().collect()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<AuctionEngine>> {
        self.engines.lock().remove(id)
    }

    /// `recover()` (spec §4.3): for every `active` record, derive the round
    /// to resume from the persisted winner count and restart it.
    ///
    /// Round derivation follows the testable property in spec §8 (`min r
    /// s.t. Σ_{i≤r} K_i ≥ W`), which is unambiguous; the worked walk-through
    /// prose in §4.3 and its seed scenario both contain an internal
    /// arithmetic inconsistency (documented in `DESIGN.md`) and are not
    /// followed where they disagree with §8.
    pub async fn recover(&self) -> Result<Vec<Arc<AuctionEngine>>, EngineError> {
        let active = self.repo.list_active().await?;
        let mut resumed = Vec::with_capacity(active.len());
        for record in active {
            let (round, gifts_awarded) =
                derive_resume_round(&record.plan, record.winners.len() as u64);
            let engine = AuctionEngine::resume_at(
                record.id.clone(),
                record.name.clone(),
                record.gift.clone(),
                record.plan.clone(),
                self.repo.clone(),
                self.sink.clone(),
                round,
                gifts_awarded,
            );
            self.engines.lock().insert(record.id.clone(), engine.clone());
            if round < engine.plan().len() {
                engine.start_round().await?;
            } else {
                engine.end_auction().await?;
            }
            resumed.push(engine);
        }
        Ok(resumed)
    }
}

/// Returns `(round_index, gifts_awarded_before_round)` where `round_index`
/// is the smallest `r` with `Σ_{i≤r} K_i ≥ winners_len`, and
/// `gifts_awarded_before_round = Σ_{i<r} K_i`.
fn derive_resume_round(plan: &[RoundPlan], winners_len: u64) -> (usize, u64) {
    let mut prefix = 0u64;
    for (r, round) in plan.iter().enumerate() {
        let k = round.count_of_gifts as u64;
        if prefix + k >= winners_len {
            return (r, prefix);
        }
        prefix += k;
    }
    (plan.len(), prefix)
}
