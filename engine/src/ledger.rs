//! `BalanceLedger` (spec §4.1): in-memory userId -> balance map with a
//! conditional debit. Owned per-engine (Design Note, §9): it carries no
//! internal locking of its own — the engine's single `parking_lot::Mutex`
//! around `EngineState` is what makes `tryDebit` atomic with respect to
//! `place_bid`'s other mutations (invariant I3).

use std::collections::HashMap;

use crate::model::{BalanceRecord, UserId};

#[derive(Debug, Default, Clone)]
pub struct BalanceLedger {
    balances: HashMap<UserId, i64>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire map atomically from a snapshot.
    pub fn load(&mut self, records: Vec<BalanceRecord>) {
        self.balances = records.into_iter().collect();
    }

    /// Produce a snapshot for persistence.
    pub fn export(&self) -> Vec<BalanceRecord> {
        self.balances
            .iter()
            .map(|(u, b)| (u.clone(), *b))
            .collect()
    }

    pub fn get(&self, user: &str) -> i64 {
        self.balances.get(user).copied().unwrap_or(0)
    }

    pub fn set(&mut self, user: &str, value: i64) {
        self.balances.insert(user.to_string(), value);
    }

    pub fn has(&self, user: &str) -> bool {
        self.balances.contains_key(user)
    }

    pub fn count(&self) -> usize {
        self.balances.len()
    }

    /// `bal[u] += n`, returns the new balance.
    pub fn add(&mut self, user: &str, amount: i64) -> i64 {
        let entry = self.balances.entry(user.to_string()).or_insert(0);
        *entry += amount;
        *entry
    }

    /// If `bal[u] >= n`, decrement and return `true`; else leave unchanged
    /// and return `false`.
    pub fn try_debit(&mut self, user: &str, amount: i64) -> bool {
        let entry = self.balances.entry(user.to_string()).or_insert(0);
        if *entry >= amount {
            *entry -= amount;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_balances() {
        let mut ledger = BalanceLedger::new();
        ledger.load(vec![("a".into(), 10), ("b".into(), 20)]);
        let mut exported = ledger.export();
        exported.sort();
        assert_eq!(exported, vec![("a".to_string(), 10), ("b".to_string(), 20)]);
    }

    #[test]
    fn try_debit_is_all_or_nothing() {
        let mut ledger = BalanceLedger::new();
        ledger.set("a", 30);
        assert!(!ledger.try_debit("a", 40));
        assert_eq!(ledger.get("a"), 30);
        assert!(ledger.try_debit("a", 30));
        assert_eq!(ledger.get("a"), 0);
    }

    #[test]
    fn add_defaults_missing_user_to_zero() {
        let mut ledger = BalanceLedger::new();
        assert_eq!(ledger.get("nobody"), 0);
        assert_eq!(ledger.add("nobody", 5), 5);
        assert!(ledger.has("nobody"));
    }

    #[test]
    fn count_reflects_distinct_users() {
        let mut ledger = BalanceLedger::new();
        ledger.set("a", 1);
        ledger.set("b", 2);
        ledger.set("a", 3);
        assert_eq!(ledger.count(), 2);
    }
}
