//! Immutable ledgers and the content-addressed oracle that interns them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hash::{hash_ledger, LedgerID, TxSetID};
use crate::time::{SimDuration, SimTime};
use crate::tx::TxSet;

/// An immutable ledger: `(seq, parent_id, txset, close_time, close_agree,
/// resolution)` plus its derived content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    id: LedgerID,
    seq: u32,
    parent_id: LedgerID,
    txset: TxSet,
    close_time: SimTime,
    close_agree: bool,
    resolution: SimDuration,
}

impl PartialEq for Ledger {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Ledger {}

impl Ledger {
    fn new(
        seq: u32,
        parent_id: LedgerID,
        txset: TxSet,
        close_time: SimTime,
        close_agree: bool,
        resolution: SimDuration,
    ) -> Self {
        let id = hash_ledger(seq, parent_id, txset.id(), close_time.as_nanos());
        Self {
            id,
            seq,
            parent_id,
            txset,
            close_time,
            close_agree,
            resolution,
        }
    }

    #[must_use]
    pub fn id(&self) -> LedgerID {
        self.id
    }

    #[must_use]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    #[must_use]
    pub fn parent_id(&self) -> LedgerID {
        self.parent_id
    }

    #[must_use]
    pub fn txset(&self) -> &TxSet {
        &self.txset
    }

    #[must_use]
    pub fn txset_id(&self) -> TxSetID {
        self.txset.id()
    }

    #[must_use]
    pub fn close_time(&self) -> SimTime {
        self.close_time
    }

    #[must_use]
    pub fn close_agree(&self) -> bool {
        self.close_agree
    }

    #[must_use]
    pub fn resolution(&self) -> SimDuration {
        self.resolution
    }

    /// True iff `other.seq < self.seq` and walking parent pointers from
    /// `self` exactly `self.seq - other.seq` times lands on `other.id()`.
    /// Any missing intermediate ancestor in `oracle` makes this `false`.
    #[must_use]
    pub fn is_ancestor(&self, other: &Ledger, oracle: &LedgerOracle) -> bool {
        if other.seq >= self.seq {
            return false;
        }
        let mut current = self.id;
        for _ in 0..(self.seq - other.seq) {
            let Some(ledger) = oracle.get(current) else {
                return false;
            };
            current = ledger.parent_id;
        }
        current == other.id
    }
}

/// Canonicalizes ledgers: identical `(parent, txset_id, close_time_ns)`
/// tuples always return the same stored [`Ledger`] instance.
pub struct LedgerOracle {
    by_id: HashMap<LedgerID, Ledger>,
    by_key: HashMap<(LedgerID, TxSetID, u64), LedgerID>,
    genesis_id: LedgerID,
}

impl Default for LedgerOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerOracle {
    #[must_use]
    pub fn new() -> Self {
        let genesis = Ledger::new(
            0,
            LedgerID::ZERO,
            TxSet::new(),
            SimTime::ZERO,
            true,
            SimDuration::ZERO,
        );
        let genesis_id = genesis.id();
        let mut by_id = HashMap::new();
        let mut by_key = HashMap::new();
        by_key.insert((LedgerID::ZERO, genesis.txset_id(), 0), genesis_id);
        by_id.insert(genesis_id, genesis);
        Self {
            by_id,
            by_key,
            genesis_id,
        }
    }

    #[must_use]
    pub fn genesis(&self) -> Ledger {
        self.by_id[&self.genesis_id].clone()
    }

    #[must_use]
    pub fn get(&self, id: LedgerID) -> Option<&Ledger> {
        self.by_id.get(&id)
    }

    /// Interns `(parent.id(), txset.id(), close_time_ns)`; clones `txset`
    /// before storing so the caller's copy stays independently mutable.
    pub fn accept(
        &mut self,
        parent: &Ledger,
        txset: &TxSet,
        close_time: SimTime,
        close_agree: bool,
        resolution: SimDuration,
    ) -> Ledger {
        let key = (parent.id(), txset.id(), close_time.as_nanos());
        if let Some(&id) = self.by_key.get(&key) {
            return self.by_id[&id].clone();
        }
        let ledger = Ledger::new(
            parent.seq() + 1,
            parent.id(),
            txset.clone(),
            close_time,
            close_agree,
            resolution,
        );
        self.by_key.insert(key, ledger.id());
        self.by_id.insert(ledger.id(), ledger.clone());
        ledger
    }

    /// Number of distinct tip chains among `ledgers`. Sorts by `seq`
    /// descending; a ledger that is an ancestor of an existing tip is
    /// discarded, one that dominates an existing tip replaces it, and
    /// anything else becomes a new tip.
    #[must_use]
    pub fn branches(&self, ledgers: &[Ledger]) -> usize {
        let mut sorted: Vec<&Ledger> = ledgers.iter().collect();
        sorted.sort_by(|a, b| b.seq().cmp(&a.seq()));

        let mut tips: Vec<Ledger> = Vec::new();
        for ledger in sorted {
            if tips.iter().any(|tip| tip.id() == ledger.id() || tip.is_ancestor(ledger, self)) {
                // `ledger` is already a known tip, or an ancestor of one: covered.
                continue;
            }
            if let Some(pos) = tips.iter().position(|tip| ledger.is_ancestor(tip, self)) {
                tips[pos] = ledger.clone();
            } else {
                tips.push(ledger.clone());
            }
        }
        tips.len()
    }
}
