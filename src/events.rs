//! The collector contract: a tagged sum over every observable consensus
//! event, dispatched to every registered collector exactly once.

use serde::{Deserialize, Serialize};

use crate::hash::LedgerID;
use crate::ledger::Ledger;
use crate::sim::PeerID;
use crate::tx::Tx;
use crate::validations::Validation;

/// A proposal as observed by a collector — the same shape peers exchange,
/// re-exported here so event payloads don't need a second type.
pub use crate::peer::Proposal;

/// Every variant the core emits, per §6's event-collector contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StartRound { ledger: LedgerID, proposer: PeerID },
    CloseLedger { ledger: LedgerID, prior_seq: u32, proposers: usize },
    AcceptLedger { ledger: Ledger },
    FullyValidateLedger { ledger: Ledger },
    ReceiveProposal { proposal: Proposal },
    ReceiveValidation { validation: Validation },
    WrongPrevLedger { wrong: LedgerID, correct: LedgerID },
    SubmitTx { tx: Tx },
}

/// Registered with a [`crate::sim::Sim`]; receives every [`Event`] as it
/// occurs, tagged with the emitting peer and the virtual time.
pub trait Collector {
    fn on(&mut self, peer_id: PeerID, sim_time: crate::time::SimTime, event: &Event);
}

/// A collector that discards everything; the default when no observer is
/// registered.
#[derive(Debug, Default)]
pub struct NullCollector;

impl Collector for NullCollector {
    fn on(&mut self, _peer_id: PeerID, _sim_time: crate::time::SimTime, _event: &Event) {}
}

/// Records every event in arrival order. Test/debugging scaffolding, not
/// a production sink (those are out of scope — see the crate's
/// Non-goals).
#[derive(Debug, Default)]
pub struct VecCollector {
    pub events: Vec<(PeerID, crate::time::SimTime, Event)>,
}

impl VecCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Collector for VecCollector {
    fn on(&mut self, peer_id: PeerID, sim_time: crate::time::SimTime, event: &Event) {
        self.events.push((peer_id, sim_time, event.clone()));
    }
}

/// Fan-out sink owned by [`crate::sim::Sim`]: dispatches every [`Event`]
/// to every registered [`Collector`] exactly once, at the time of
/// occurrence.
#[derive(Default)]
pub struct Collectors(Vec<Box<dyn Collector>>);

impl Collectors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collector: Box<dyn Collector>) {
        self.0.push(collector);
    }

    pub(crate) fn dispatch(&mut self, peer_id: PeerID, sim_time: crate::time::SimTime, event: Event) {
        for collector in &mut self.0 {
            collector.on(peer_id, sim_time, &event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SimTime;

    #[test]
    fn vec_collector_records_every_event_in_order() {
        let mut c = VecCollector::new();
        c.on(PeerID(0), SimTime::from_nanos(1), &Event::SubmitTx { tx: Tx(1) });
        c.on(PeerID(0), SimTime::from_nanos(2), &Event::SubmitTx { tx: Tx(2) });
        assert_eq!(c.events.len(), 2);
        assert_eq!(c.events[0].1, SimTime::from_nanos(1));
        assert_eq!(c.events[1].1, SimTime::from_nanos(2));
    }

    #[test]
    fn null_collector_accepts_without_panicking() {
        let mut c = NullCollector;
        c.on(PeerID(0), SimTime::ZERO, &Event::SubmitTx { tx: Tx(1) });
    }
}
