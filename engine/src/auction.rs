//! `AuctionEngine` (spec §4.2): the round state machine, leaderboard,
//! anti-snipe timer and commit path for one auction.
//!
//! Concurrency (§5, Open Question 2, §9): every mutation of engine state
//! (`bids`/`sorted`/`roundEndTime`/`isActive`/`currentRound`, and the
//! co-resident `BalanceLedger`) happens under a single `parking_lot::Mutex`.
//! `place_bid` never awaits while holding it; lifecycle methods release it
//! before repository I/O and re-acquire it only to commit an already-
//! successful write, so a failed write leaves in-memory state unchanged.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::bid::{AcceptedBid, BidResult};
use crate::config::AntiSnipeConfig;
use crate::error::{BidError, EngineError};
use crate::events::EventSink;
use crate::ledger::BalanceLedger;
use crate::leaderboard::Leaderboard;
use crate::model::{AuctionId, AuctionRecord, AuctionStatus, Bid, Gift, RoundPlan, Winner};
use crate::repository::Repository;

struct EngineState {
    current_round: usize,
    ledger: BalanceLedger,
    board: Leaderboard,
    round_end_time: Option<Instant>,
    is_active: bool,
    last_timestamp: u64,
    /// Sum of `K_i` for already-closed rounds; `giftNumber` assignment
    /// continues from here (spec §3).
    gifts_awarded: u64,
    /// Set once, on construction, for a freshly-recovered engine whose
    /// in-memory ledger starts empty regardless of which round it resumes
    /// at (Open Question 1, §9 — see `resume_at`).
    needs_balance_reload: bool,
}

impl EngineState {
    fn new() -> Self {
        Self {
            current_round: 0,
            ledger: BalanceLedger::new(),
            board: Leaderboard::new(),
            round_end_time: None,
            is_active: false,
            last_timestamp: 0,
            gifts_awarded: 0,
            needs_balance_reload: false,
        }
    }

    /// Strictly increasing across every accepted bid (§5 "Ordering
    /// guarantees"), regardless of wall-clock tick granularity.
    fn next_timestamp(&mut self, now: Instant, epoch: Instant) -> u64 {
        let raw = now.saturating_duration_since(epoch).as_millis() as u64;
        let timestamp = raw.max(self.last_timestamp + 1);
        self.last_timestamp = timestamp;
        timestamp
    }
}

pub struct AuctionEngine {
    id: AuctionId,
    name: String,
    gift: Gift,
    plan: Vec<RoundPlan>,
    anti_snipe: AntiSnipeConfig,
    repo: Arc<dyn Repository>,
    sink: Arc<dyn EventSink>,
    state: Mutex<EngineState>,
    timer: Mutex<Option<JoinHandle<()>>>,
    epoch: Instant,
    self_weak: Weak<AuctionEngine>,
}

impl AuctionEngine {
    pub fn new(
        id: AuctionId,
        name: String,
        gift: Gift,
        plan: Vec<RoundPlan>,
        repo: Arc<dyn Repository>,
        sink: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        Self::with_config(id, name, gift, plan, repo, sink, AntiSnipeConfig::default())
    }

    pub fn with_config(
        id: AuctionId,
        name: String,
        gift: Gift,
        plan: Vec<RoundPlan>,
        repo: Arc<dyn Repository>,
        sink: Arc<dyn EventSink>,
        anti_snipe: AntiSnipeConfig,
    ) -> Arc<Self> {
        assert!(!plan.is_empty(), "an auction's plan must be non-empty");
        assert!(
            plan.iter().all(|r| r.count_of_gifts >= 1),
            "every round must offer at least one gift"
        );
        Arc::new_cyclic(|weak| AuctionEngine {
            id,
            name,
            gift,
            plan,
            anti_snipe,
            repo,
            sink,
            state: Mutex::new(EngineState::new()),
            timer: Mutex::new(None),
            epoch: Instant::now(),
            self_weak: weak.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> &[RoundPlan] {
        &self.plan
    }

    pub fn current_round(&self) -> usize {
        self.state.lock().current_round
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().is_active
    }

    pub fn leaderboard_snapshot(&self) -> Vec<(String, Bid)> {
        self.state.lock().board.iter().collect()
    }

    pub fn balance_of(&self, user: &str) -> i64 {
        self.state.lock().ledger.get(user)
    }

    /// Construct an engine whose `current_round` is pre-seeded, used by
    /// `AuctionRegistry::recover` (spec §4.3) to resume mid-plan without
    /// replaying already-closed rounds.
    pub(crate) fn resume_at(
        id: AuctionId,
        name: String,
        gift: Gift,
        plan: Vec<RoundPlan>,
        repo: Arc<dyn Repository>,
        sink: Arc<dyn EventSink>,
        resume_round: usize,
        gifts_awarded: u64,
    ) -> Arc<Self> {
        let engine = Self::new(id, name, gift, plan, repo, sink);
        {
            let mut st = engine.state.lock();
            st.current_round = resume_round;
            st.gifts_awarded = gifts_awarded;
            st.needs_balance_reload = true;
        }
        engine
    }

    /// `startRound()` (spec §4.2). Idempotent guard: if the plan is already
    /// exhausted, routes to `end_auction` instead.
    ///
    /// Balances are reloaded from the repository only once per engine
    /// lifetime — at round 0, or at the first `start_round` of a recovered
    /// engine — not on every round (Open Question 1, §9). Reloading on
    /// every round, as the literal spec prose first suggests, would
    /// overwrite the ledger's escrowed debits for bids carried forward
    /// from a prior round and contradicts the worked "Carry-over" scenario
    /// in §8, whose final balances only hold if carried escrow survives.
    pub async fn start_round(&self) -> Result<(), EngineError> {
        let (round_index, reload) = {
            let st = self.state.lock();
            if st.current_round >= self.plan.len() {
                (None, false)
            } else if st.is_active {
                return Err(EngineError::InvalidState(
                    "start_round called while a round is already active".into(),
                ));
            } else {
                (Some(st.current_round), st.current_round == 0 || st.needs_balance_reload)
            }
        };
        let Some(round_index) = round_index else {
            return self.end_auction().await;
        };

        let balances = if reload {
            Some(self.repo.load_balances().await?)
        } else {
            None
        };
        self.repo.set_status(&self.id, AuctionStatus::Active).await?;

        let deadline = {
            let mut st = self.state.lock();
            if let Some(balances) = balances {
                st.ledger.load(balances);
                st.needs_balance_reload = false;
            }
            if round_index == 0 {
                st.board.clear();
            }
            let duration = Duration::from_secs(self.plan[round_index].duration_seconds);
            let deadline = Instant::now() + duration;
            st.round_end_time = Some(deadline);
            st.is_active = true;
            deadline
        };

        tracing::info!(auction_id = %self.id, round_index, "round started");
        self.arm_timer(deadline);
        Ok(())
    }

    /// `placeBid(userId, amount)` (spec §4.2). Synchronous and total: no
    /// I/O, no `.await`, observes a single consistent snapshot of state.
    pub fn place_bid(&self, user_id: &str, amount: i64) -> BidResult {
        let mut st = self.state.lock();

        if !st.is_active {
            return Err(BidError::NotActive);
        }
        if amount <= 0 {
            return Err(BidError::NonPositive);
        }
        let amount = amount as u64;

        let current = st.board.get(user_id).map(|b| b.amount).unwrap_or(0);
        if amount <= current {
            return Err(BidError::NotHigher { current });
        }
        let delta = amount - current;

        let balance = st.ledger.get(user_id);
        if balance < delta as i64 {
            return Err(BidError::InsufficientFunds {
                deficit: delta - balance.max(0) as u64,
            });
        }

        let debited = st.ledger.try_debit(user_id, delta as i64);
        debug_assert!(debited, "balance check above guarantees this succeeds");

        let round_index = st.current_round;
        let k = self.plan[round_index].count_of_gifts as usize;
        let threshold = st.board.kth_amount(k).unwrap_or(0);
        let now = Instant::now();
        let remaining = st.round_end_time.map(|end| end.saturating_duration_since(now));

        let timestamp = st.next_timestamp(now, self.epoch);
        st.board.replace(user_id.to_string(), Bid { amount, timestamp });

        let mut new_deadline = None;
        if let Some(remaining) = remaining {
            let triggered = !remaining.is_zero()
                && remaining < self.anti_snipe.window
                && threshold > 0
                && amount > threshold;
            if triggered {
                let deadline = now + self.anti_snipe.extension;
                st.round_end_time = Some(deadline);
                new_deadline = Some(deadline);
                tracing::info!(
                    auction_id = %self.id,
                    user_id,
                    amount,
                    "anti-snipe extension triggered"
                );
            }
        }
        drop(st);

        if let Some(deadline) = new_deadline {
            self.arm_timer(deadline);
        }

        tracing::debug!(auction_id = %self.id, user_id, amount, timestamp, "bid accepted");
        Ok(AcceptedBid { amount, timestamp })
    }

    /// `endRound()` (spec §4.2). Idempotent under the `isActive` guard:
    /// concurrent/late invocations past the first return immediately.
    pub async fn end_round(&self) -> Result<(), EngineError> {
        let Some((round_index, winners)) = ({
            let mut st = self.state.lock();
            if !st.is_active {
                None
            } else {
                let round_index = st.current_round;
                let k = self.plan[round_index].count_of_gifts as usize;
                let gifts_awarded = st.gifts_awarded;
                let winners: Vec<Winner> = st
                    .board
                    .top_k(k)
                    .into_iter()
                    .enumerate()
                    .map(|(i, (user_id, bid))| Winner {
                        user_id,
                        stars: bid.amount,
                        gift_number: gifts_awarded + i as u64 + 1,
                    })
                    .collect();
                // Tentatively mark inactive so concurrent place_bid calls
                // observe the round as closed while we persist (§5).
                st.is_active = false;
                Some((round_index, winners))
            }
        }) else {
            return Ok(());
        };

        if let Err(err) = self.repo.append_winners(&self.id, winners.clone()).await {
            // Roll back: the write failed, in-memory state must be
            // unchanged (§4.2 "Failure semantics").
            let mut st = self.state.lock();
            st.is_active = true;
            return Err(err.into());
        }

        {
            let mut st = self.state.lock();
            for winner in &winners {
                st.board.remove(&winner.user_id);
            }
            st.gifts_awarded += winners.len() as u64;
            st.current_round += 1;
        }

        self.sink.on_round_end(&self.id, round_index, &winners).await;
        tracing::info!(
            auction_id = %self.id,
            round_index,
            winners = winners.len(),
            "round closed"
        );

        let still_running = self.state.lock().current_round < self.plan.len();
        if still_running {
            self.start_round().await
        } else {
            self.end_auction().await
        }
    }

    /// `endAuction()` (spec §4.2).
    pub async fn end_auction(&self) -> Result<(), EngineError> {
        let snapshot = {
            let mut st = self.state.lock();
            st.is_active = false;
            self.cancel_timer_sync();
            let refunds: Vec<(String, i64)> = st
                .board
                .iter()
                .map(|(user, bid)| (user, bid.amount as i64))
                .collect();
            for (user, amount) in refunds {
                st.ledger.add(&user, amount);
            }
            st.board.clear();
            st.ledger.export()
        };

        self.repo.save_balances(snapshot).await?;
        self.repo
            .finish_auction(&self.id, self.epoch.elapsed().as_millis() as u64)
            .await?;

        self.sink.on_auction_end(&self.id).await;
        tracing::info!(auction_id = %self.id, "auction finished");
        Ok(())
    }

    pub fn record_snapshot(&self, created_at: u64) -> AuctionRecord {
        AuctionRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            gift: self.gift.clone(),
            plan: self.plan.clone(),
            winners: Vec::new(),
            status: AuctionStatus::Pending,
            created_at,
            finished_at: None,
        }
    }

    fn arm_timer(&self, deadline: Instant) {
        self.cancel_timer_sync();
        let Some(engine) = self.self_weak.upgrade() else {
            return;
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Err(err) = engine.end_round().await {
                tracing::error!(auction_id = %engine.id, error = %err, "timer-driven end_round failed");
            }
        });
        *self.timer.lock() = Some(handle);
    }

    fn cancel_timer_sync(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for AuctionEngine {
    fn drop(&mut self) {
        self.cancel_timer_sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LoggingSink;
    use crate::model::Gift;
    use crate::repository::InMemoryRepository;

    fn gift() -> Gift {
        Gift {
            id: "g1".into(),
            name: "golden ticket".into(),
        }
    }

    async fn engine_with(
        plan: Vec<RoundPlan>,
        balances: Vec<(&str, i64)>,
    ) -> (Arc<AuctionEngine>, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        repo.save_balances(balances.into_iter().map(|(u, b)| (u.to_string(), b)).collect())
            .await
            .unwrap();
        let sink: Arc<dyn EventSink> = Arc::new(LoggingSink);
        let engine = AuctionEngine::new(
            "a1".into(),
            "demo".into(),
            gift(),
            plan,
            repo.clone(),
            sink,
        );
        repo.create_auction(engine.record_snapshot(0)).await.unwrap();
        (engine, repo)
    }

    #[tokio::test]
    async fn basic_round_awards_top_k_and_refunds_rest() {
        let (engine, repo) = engine_with(
            vec![RoundPlan {
                count_of_gifts: 2,
                duration_seconds: 10,
            }],
            vec![("a", 100), ("b", 100), ("c", 100)],
        )
        .await;
        engine.start_round().await.unwrap();

        engine.place_bid("a", 10).unwrap();
        engine.place_bid("b", 20).unwrap();
        engine.place_bid("c", 15).unwrap();
        engine.place_bid("a", 30).unwrap();

        engine.end_round().await.unwrap();

        let record = repo.get_auction("a1").await.unwrap().unwrap();
        assert_eq!(record.winners.len(), 2);
        assert_eq!(record.winners[0].user_id, "a");
        assert_eq!(record.winners[0].gift_number, 1);
        assert_eq!(record.winners[1].user_id, "b");
        assert_eq!(record.winners[1].gift_number, 2);
        assert_eq!(record.status, AuctionStatus::Finished);

        assert_eq!(engine.balance_of("c"), 100); // never debited past the refund
        let final_balances: std::collections::HashMap<_, _> =
            repo.load_balances().await.unwrap().into_iter().collect();
        assert_eq!(final_balances["a"], 70);
        assert_eq!(final_balances["b"], 80);
        assert_eq!(final_balances["c"], 100);
    }

    #[tokio::test]
    async fn carry_over_round_preserves_losing_bid() {
        let (engine, repo) = engine_with(
            vec![
                RoundPlan {
                    count_of_gifts: 1,
                    duration_seconds: 5,
                },
                RoundPlan {
                    count_of_gifts: 1,
                    duration_seconds: 5,
                },
            ],
            vec![("a", 100), ("b", 100)],
        )
        .await;
        engine.start_round().await.unwrap();
        engine.place_bid("a", 10).unwrap();
        engine.place_bid("b", 20).unwrap();
        engine.end_round().await.unwrap(); // closes round 0, starts round 1

        assert_eq!(engine.current_round(), 1);
        assert!(engine.is_active());
        assert_eq!(engine.leaderboard_snapshot().len(), 1); // a carries forward

        engine.end_round().await.unwrap(); // no new bids, a wins by default

        let record = repo.get_auction("a1").await.unwrap().unwrap();
        assert_eq!(record.winners.len(), 2);
        assert_eq!(record.winners[0].user_id, "b");
        assert_eq!(record.winners[1].user_id, "a");
        assert_eq!(record.winners[1].stars, 10);

        let final_balances: std::collections::HashMap<_, _> =
            repo.load_balances().await.unwrap().into_iter().collect();
        assert_eq!(final_balances["a"], 90);
        assert_eq!(final_balances["b"], 80);
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_state_unchanged() {
        let (engine, _repo) = engine_with(
            vec![RoundPlan {
                count_of_gifts: 1,
                duration_seconds: 10,
            }],
            vec![("a", 30)],
        )
        .await;
        engine.start_round().await.unwrap();
        engine.place_bid("a", 20).unwrap();
        assert_eq!(engine.balance_of("a"), 10);

        let err = engine.place_bid("a", 60).unwrap_err();
        assert_eq!(err, BidError::InsufficientFunds { deficit: 30 });
        assert_eq!(engine.balance_of("a"), 10);
        assert_eq!(engine.leaderboard_snapshot()[0].1.amount, 20);
    }

    #[tokio::test]
    async fn equal_or_lower_bid_rejected() {
        let (engine, _repo) = engine_with(
            vec![RoundPlan {
                count_of_gifts: 1,
                duration_seconds: 10,
            }],
            vec![("a", 100)],
        )
        .await;
        engine.start_round().await.unwrap();
        engine.place_bid("a", 20).unwrap();
        assert_eq!(
            engine.place_bid("a", 20).unwrap_err(),
            BidError::NotHigher { current: 20 }
        );
        assert_eq!(
            engine.place_bid("a", 0).unwrap_err(),
            BidError::NonPositive
        );
    }

    #[tokio::test]
    async fn bids_rejected_once_round_is_not_active() {
        let (engine, _repo) = engine_with(
            vec![RoundPlan {
                count_of_gifts: 1,
                duration_seconds: 10,
            }],
            vec![("a", 100)],
        )
        .await;
        assert_eq!(engine.place_bid("a", 10).unwrap_err(), BidError::NotActive);
    }

    #[tokio::test]
    async fn underfilled_round_awards_fewer_than_k_winners() {
        let (engine, repo) = engine_with(
            vec![RoundPlan {
                count_of_gifts: 2,
                duration_seconds: 10,
            }],
            vec![("a", 100)],
        )
        .await;
        engine.start_round().await.unwrap();
        engine.place_bid("a", 50).unwrap();
        engine.end_round().await.unwrap();

        let record = repo.get_auction("a1").await.unwrap().unwrap();
        assert_eq!(record.winners.len(), 1);
        assert_eq!(record.winners[0].gift_number, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn anti_snipe_extends_deadline_when_top_bid_is_displaced_near_close() {
        let (engine, _repo) = engine_with(
            vec![RoundPlan {
                count_of_gifts: 1,
                duration_seconds: 10,
            }],
            vec![("a", 100), ("b", 100)],
        )
        .await;
        engine.start_round().await.unwrap();
        engine.place_bid("a", 50).unwrap();

        tokio::time::sleep(Duration::from_secs(9)).await; // remaining = 1s < W
        engine.place_bid("b", 60).unwrap(); // displaces a, triggers extension

        tokio::time::sleep(Duration::from_millis(1_100)).await; // past the original 10s deadline
        assert!(engine.is_active(), "round should still be open after extension");

        tokio::time::sleep(Duration::from_secs(9)).await; // past the extended ~19s deadline
        tokio::task::yield_now().await;
        assert!(!engine.is_active(), "round should close at the extended deadline");
    }

    #[tokio::test(start_paused = true)]
    async fn anti_snipe_does_not_trigger_when_leaderboard_is_underfilled() {
        let (engine, _repo) = engine_with(
            vec![RoundPlan {
                count_of_gifts: 2,
                duration_seconds: 10,
            }],
            vec![("a", 100)],
        )
        .await;
        engine.start_round().await.unwrap();

        tokio::time::sleep(Duration::from_secs(9)).await;
        engine.place_bid("a", 50).unwrap(); // only bidder; |sorted| < K, threshold = 0

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        tokio::task::yield_now().await;
        assert!(!engine.is_active(), "round should close on schedule, no extension");
    }
}
