//! The sorted leaderboard view (spec §4.2 "Leaderboard maintenance"):
//! ordered by `(amount desc, timestamp asc)`, stable tie-break by insertion
//! order when amount and timestamp both match (Open Question 3, §9).
//!
//! Backed by a `BTreeSet` keyed on a total order derived from the tuple —
//! `topK`/`insert`/`replace`/`remove` are all O(log n), satisfying the
//! spec's requirement without resorting to linear reinsertion.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use crate::model::{Bid, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: (Reverse<u64>, u64),
    user_id: UserId,
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl Entry {
    fn new(user_id: UserId, bid: Bid) -> Self {
        Self {
            key: (Reverse(bid.amount), bid.timestamp),
            user_id,
        }
    }
}

/// Satisfies invariants I1/I2/I4: `bids` and `sorted` always contain the
/// same elements, one per user, ordered by `(amount desc, timestamp asc)`.
#[derive(Debug, Default, Clone)]
pub struct Leaderboard {
    bids: HashMap<UserId, Bid>,
    sorted: BTreeSet<Entry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.sorted.clear();
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    pub fn get(&self, user_id: &str) -> Option<Bid> {
        self.bids.get(user_id).copied()
    }

    /// Insert a brand-new bid or replace an existing user's bid, preserving
    /// I1/I2. Callers are responsible for the monotonicity check (I5)
    /// before calling this.
    pub fn replace(&mut self, user_id: UserId, bid: Bid) {
        if let Some(old) = self.bids.get(&user_id).copied() {
            self.sorted.remove(&Entry::new(user_id.clone(), old));
        }
        self.sorted.insert(Entry::new(user_id.clone(), bid));
        self.bids.insert(user_id, bid);
    }

    /// Remove a user's bid entirely (they won, or the auction ended).
    pub fn remove(&mut self, user_id: &str) -> Option<Bid> {
        let bid = self.bids.remove(user_id)?;
        self.sorted.remove(&Entry::new(user_id.to_string(), bid));
        Some(bid)
    }

    /// The top `k` bids in leaderboard order, O(k).
    pub fn top_k(&self, k: usize) -> Vec<(UserId, Bid)> {
        self.sorted
            .iter()
            .take(k)
            .map(|e| (e.user_id.clone(), self.bids[&e.user_id]))
            .collect()
    }

    /// The amount of the `k`-th ranked bid (1-indexed), or `None` if fewer
    /// than `k` bids are live. Used by the anti-snipe threshold (§4.2).
    pub fn kth_amount(&self, k: usize) -> Option<u64> {
        if k == 0 {
            return None;
        }
        self.sorted.iter().nth(k - 1).map(|e| e.key.0 .0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (UserId, Bid)> + '_ {
        self.sorted
            .iter()
            .map(|e| (e.user_id.clone(), self.bids[&e.user_id]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(amount: u64, timestamp: u64) -> Bid {
        Bid { amount, timestamp }
    }

    #[test]
    fn orders_by_amount_desc_then_timestamp_asc() {
        let mut lb = Leaderboard::new();
        lb.replace("a".into(), bid(10, 5));
        lb.replace("b".into(), bid(20, 1));
        lb.replace("c".into(), bid(20, 0));
        let top = lb.top_k(3);
        assert_eq!(top[0].0, "c"); // same amount as b, earlier timestamp wins
        assert_eq!(top[1].0, "b");
        assert_eq!(top[2].0, "a");
    }

    #[test]
    fn replace_moves_existing_user_without_duplicating() {
        let mut lb = Leaderboard::new();
        lb.replace("a".into(), bid(10, 0));
        lb.replace("a".into(), bid(30, 5));
        assert_eq!(lb.len(), 1);
        assert_eq!(lb.get("a").unwrap().amount, 30);
    }

    #[test]
    fn kth_amount_is_none_when_underfilled() {
        let mut lb = Leaderboard::new();
        lb.replace("a".into(), bid(10, 0));
        assert_eq!(lb.kth_amount(2), None);
        assert_eq!(lb.kth_amount(1), Some(10));
    }

    #[test]
    fn remove_drops_from_both_views() {
        let mut lb = Leaderboard::new();
        lb.replace("a".into(), bid(10, 0));
        lb.replace("b".into(), bid(20, 0));
        lb.remove("b");
        assert_eq!(lb.len(), 1);
        assert_eq!(lb.top_k(5).len(), 1);
    }
}
