//! Per-peer validation store: indexes by ledger and by node, and answers
//! the quorum/preferred-ledger/laggard queries the consensus round needs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hash::LedgerID;
use crate::ledger::Ledger;
use crate::sim::PeerID;
use crate::time::SimTime;

/// A single node's signed statement that it accepted a given ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub ledger_id: LedgerID,
    pub seq: u32,
    pub sign_time: SimTime,
    pub seen_time: SimTime,
    pub node_id: PeerID,
    pub full: bool,
    pub trusted: bool,
}

/// Outcome of [`Validations::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Newest validation seen from this node; stored.
    Current,
    /// `seq <= existing.seq` for the same ledger the node last validated;
    /// not stored.
    Stale,
    /// `seq <= existing.seq` but for a *different* ledger than the node's
    /// last validation — the node is equivocating rather than merely
    /// behind. Not stored.
    BadSeq,
}

#[derive(Debug, Default)]
pub struct Validations {
    by_ledger: HashMap<LedgerID, HashMap<PeerID, Validation>>,
    by_node: HashMap<PeerID, Validation>,
    last_seq: HashMap<PeerID, u32>,
    trusted_count: HashMap<LedgerID, u64>,
    ledger_seq: HashMap<LedgerID, u32>,
}

impl Validations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node_id: PeerID, val: Validation) -> AddOutcome {
        self.ledger_seq.insert(val.ledger_id, val.seq);

        if let Some(existing) = self.by_node.get(&node_id) {
            if val.seq <= existing.seq {
                return if val.ledger_id == existing.ledger_id {
                    AddOutcome::Stale
                } else {
                    AddOutcome::BadSeq
                };
            }
        }

        self.by_node.insert(node_id, val);
        self.by_ledger.entry(val.ledger_id).or_default().insert(node_id, val);
        self.last_seq.insert(node_id, val.seq);
        if val.trusted {
            *self.trusted_count.entry(val.ledger_id).or_insert(0) += 1;
        }
        AddOutcome::Current
    }

    #[must_use]
    pub fn num_trusted_for_ledger(&self, ledger_id: LedgerID) -> u64 {
        self.trusted_count.get(&ledger_id).copied().unwrap_or(0)
    }

    /// Count of nodes whose most recent validation is past `prev_ledger`.
    #[must_use]
    pub fn get_nodes_after(&self, prev_ledger: &Ledger, _prev_id: LedgerID) -> usize {
        self.last_seq
            .values()
            .filter(|&&seq| seq > prev_ledger.seq())
            .count()
    }

    /// Ledger id with the greatest trusted-validation count among ledgers
    /// with `seq >= earliest_seq`; `current.id()` if none qualify.
    #[must_use]
    pub fn get_preferred(&self, current: &Ledger, earliest_seq: u32) -> LedgerID {
        let mut best: Option<(LedgerID, u64)> = None;
        for (&ledger_id, &count) in &self.trusted_count {
            let seq = self.ledger_seq.get(&ledger_id).copied().unwrap_or(0);
            if seq < earliest_seq {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_id, best_count)) => {
                    count > best_count || (count == best_count && ledger_id.0 < best_id.0)
                }
            };
            if better {
                best = Some((ledger_id, count));
            }
        }
        best.map_or(current.id(), |(id, _)| id)
    }

    /// Count of trusted validators in `trusted_set` whose `last_seq < seq`.
    #[must_use]
    pub fn laggards(&self, seq: u32, trusted_set: &[PeerID]) -> usize {
        trusted_set
            .iter()
            .filter(|node| self.last_seq.get(node).copied().unwrap_or(0) < seq)
            .count()
    }
}
