//! The simulation façade: owns every shared collaborator (scheduler,
//! oracle, trust graph, network, the peer arena) and drives virtual time.
//!
//! Generalizes the teacher's `Simulation`/`SimConfig` façade (one event
//! loop, one clock, one rng) into "own scheduler + network + trust graph
//! + oracle + peer arena", per the arena-of-indices ownership model: peers
//! are addressed by [`PeerID`], never by direct reference, so components
//! never hold a cycle back into each other.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SimError;
use crate::events::{Collector, Collectors};
use crate::hash::LedgerID;
use crate::ledger::LedgerOracle;
use crate::network::BasicNetwork;
use crate::peer::{Cx, Mode, Peer, PeerConfig, Phase, Proposal};
use crate::scheduler::Scheduler;
use crate::time::{SimDuration, SimTime};
use crate::trust::TrustGraph;
use crate::tx::{Tx, TxSet};
use crate::validations::Validation;

/// A simulated peer's stable identity. Assigned at creation, never reused
/// within a [`Sim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerID(pub u32);

/// The payload of a single gossip message, deduplicated by `(origin, seq)`
/// at the receiver's [`Router`] before this ever reaches a handler.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Proposal(Proposal),
    TxSet(TxSet),
    Tx(Tx),
    Validation(Validation),
}

/// What the [`Scheduler`] actually carries: either a peer's heartbeat tick
/// or a network delivery addressed to a peer.
pub(crate) enum EventKind {
    Heartbeat {
        peer: PeerID,
    },
    Deliver {
        to: PeerID,
        origin: PeerID,
        seq: u64,
        payload: Payload,
    },
}

/// Per-peer summary returned by [`Sim::get_consensus_results`]. Pins down
/// the "per-peer summary" shape spec.md §6 leaves unstated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSummary {
    pub peer_id: PeerID,
    pub lcl_id: LedgerID,
    pub lcl_seq: u32,
    pub fvl_id: LedgerID,
    pub fvl_seq: u32,
    pub completed_ledgers: u32,
    pub phase: Phase,
    pub mode: Mode,
}

/// Owns the scheduler, ledger oracle, trust graph, network, and peer
/// arena; exposes run/partition/submit operations. Construction resets
/// every piece of process-wide state so independent `Sim`s never observe
/// each other's peers (per §9's registry-reset requirement).
pub struct Sim {
    seed: u64,
    scheduler: Scheduler<EventKind>,
    oracle: LedgerOracle,
    trust: TrustGraph,
    network: BasicNetwork,
    peers: Vec<Peer>,
    collectors: Collectors,
}

impl Sim {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            scheduler: Scheduler::new(),
            oracle: LedgerOracle::new(),
            trust: TrustGraph::new(),
            network: BasicNetwork::new(),
            peers: Vec::new(),
            collectors: Collectors::new(),
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn register_collector(&mut self, collector: Box<dyn Collector>) {
        self.collectors.register(collector);
    }

    /// Creates `n` peers sharing `config` (with `target_ledgers` already
    /// set on it by the caller — see `DESIGN.md`'s tie-break/target-ledgers
    /// resolution), self-trusting, and not yet connected to anything.
    pub fn create_group(&mut self, n: usize, config: PeerConfig) -> Result<PeerGroup, SimError> {
        if n == 0 {
            return Err(SimError::InvalidPeerCount(n));
        }
        if config.quorum_ratio <= 0.0 || config.quorum_ratio > 1.0 {
            return Err(SimError::InvalidQuorumRatio(config.quorum_ratio));
        }
        trace!(n, quorum_ratio = config.quorum_ratio, "creating peer group");
        let genesis = self.oracle.genesis();
        let mut members = Vec::with_capacity(n);
        for _ in 0..n {
            let id = PeerID(self.peers.len() as u32);
            self.trust.trust(id, id);
            self.peers.push(Peer::new(id, config.clone(), genesis.clone()));
            members.push(id);
        }
        Ok(PeerGroup { members })
    }

    fn peer_mut(&mut self, id: PeerID) -> &mut Peer {
        &mut self.peers[id.0 as usize]
    }

    fn cx(&mut self) -> (&mut [Peer], Cx<'_>) {
        let Self {
            peers,
            oracle,
            trust,
            network,
            scheduler,
            collectors,
            ..
        } = self;
        (
            peers.as_mut_slice(),
            Cx {
                oracle,
                trust,
                network,
                scheduler,
                collectors,
            },
        )
    }

    fn start_all(&mut self) {
        let ids: Vec<PeerID> = self.peers.iter().map(Peer::id).collect();
        for id in ids {
            if self.peer_mut(id).started() {
                continue;
            }
            let (peers, mut cx) = self.cx();
            peers[id.0 as usize].start(&mut cx);
        }
    }

    fn dispatch(&mut self, when: SimTime, event: EventKind) {
        match event {
            EventKind::Heartbeat { peer } => {
                let (peers, mut cx) = self.cx();
                peers[peer.0 as usize].on_heartbeat(when, &mut cx);
            }
            EventKind::Deliver { to, origin, seq, payload } => {
                if !self.network.is_connected(to, origin) {
                    trace!(to = to.0, origin = origin.0, at = %when, "delivery dropped, link torn down");
                    return; // link torn down while in flight; drop silently
                }
                let (peers, mut cx) = self.cx();
                let peer = &mut peers[to.0 as usize];
                if !peer.router_mut().should_process(origin, seq) {
                    return;
                }
                match payload {
                    Payload::Proposal(p) => peer.on_proposal(when, origin, p, &mut cx),
                    Payload::TxSet(t) => peer.on_txset(t),
                    Payload::Tx(t) => peer.on_tx(when, origin, t, &mut cx),
                    Payload::Validation(v) => peer.on_validation(when, origin, v, &mut cx),
                }
            }
        }
    }

    /// Submits `tx` as if from `peer`'s own user: adds it to `open_txs` and
    /// emits `SubmitTx`.
    pub fn submit_tx(&mut self, peer: PeerID, tx: Tx) {
        let (peers, mut cx) = self.cx();
        peers[peer.0 as usize].submit_tx(tx, &mut cx);
    }

    pub fn submit_tx_all(&mut self, tx: Tx) {
        let ids: Vec<PeerID> = self.peers.iter().map(Peer::id).collect();
        for id in ids {
            self.submit_tx(id, tx);
        }
    }

    /// Starts every unstarted peer, then drains the scheduler until every
    /// peer has reached `completed_ledgers >= target_ledgers` or the queue
    /// empties.
    pub fn run(&mut self, n_ledgers: u32) -> usize {
        for peer in &mut self.peers {
            peer.set_target_ledgers(n_ledgers);
        }
        self.start_all();
        self.run_while(|sim| {
            sim.peers
                .iter()
                .any(|p| p.completed_ledgers() < p.target_ledgers())
        })
    }

    pub fn run_for(&mut self, delay: SimDuration) -> usize {
        self.start_all();
        let end = self.now() + delay;
        self.run_until(end)
            .expect("end = now() + delay can never precede now()")
    }

    pub fn run_until(&mut self, end: SimTime) -> Result<usize, SimError> {
        if end < self.now() {
            return Err(SimError::TimeTravel { requested: end, now: self.now() });
        }
        self.start_all();
        let mut count = 0;
        loop {
            let Some(t) = self.scheduler.peek_time() else {
                break;
            };
            if t > end {
                break;
            }
            if !self.step_one() {
                break;
            }
            count += 1;
        }
        if self.scheduler.now() < end {
            // advance the clock to `end` even if the queue drained early
            self.scheduler.step_until(end, |_, _| {});
        }
        Ok(count)
    }

    /// Calls `step_one` while `pred(self)` holds.
    pub fn run_while(&mut self, mut pred: impl FnMut(&Sim) -> bool) -> usize {
        self.start_all();
        let mut count = 0;
        while pred(self) {
            if !self.step_one() {
                break;
            }
            count += 1;
        }
        count
    }

    fn step_one(&mut self) -> bool {
        let Some((when, event)) = self.scheduler.pop_one() else {
            return false;
        };
        self.dispatch(when, event);
        true
    }

    /// `true` iff every peer in `group` shares the same `lcl` AND the same
    /// `fvl`.
    #[must_use]
    pub fn synchronized(&self, group: &PeerGroup) -> bool {
        let mut lcls = HashSet::new();
        let mut fvls = HashSet::new();
        for &id in &group.members {
            let peer = &self.peers[id.0 as usize];
            lcls.insert(peer.lcl().id());
            fvls.insert(peer.fvl().id());
        }
        lcls.len() <= 1 && fvls.len() <= 1
    }

    #[must_use]
    pub fn branches(&self, group: &PeerGroup) -> usize {
        let ledgers: Vec<_> = group
            .members
            .iter()
            .map(|&id| self.peers[id.0 as usize].lcl().clone())
            .collect();
        self.oracle.branches(&ledgers)
    }

    #[must_use]
    pub fn get_consensus_results(&self) -> Vec<PeerSummary> {
        self.peers
            .iter()
            .map(|p| PeerSummary {
                peer_id: p.id(),
                lcl_id: p.lcl().id(),
                lcl_seq: p.lcl().seq(),
                fvl_id: p.fvl().id(),
                fvl_seq: p.fvl().seq(),
                completed_ledgers: p.completed_ledgers(),
                phase: p.phase(),
                mode: p.mode(),
            })
            .collect()
    }

    pub(crate) fn trust_graph(&mut self) -> &mut TrustGraph {
        &mut self.trust
    }

    pub(crate) fn network(&mut self) -> &mut BasicNetwork {
        &mut self.network
    }
}

/// A named set of peers with trust/connect convenience operations and set
/// algebra. Holds indices only (per the arena ownership model), so every
/// operation takes the owning [`Sim`] explicitly rather than a
/// back-reference — a deliberate deviation from the spec's bare
/// `group.trust(other)` call shape, documented in `DESIGN.md`.
#[derive(Debug, Clone)]
pub struct PeerGroup {
    members: Vec<PeerID>,
}

impl PeerGroup {
    #[must_use]
    pub fn new(members: Vec<PeerID>) -> Self {
        Self { members }
    }

    #[must_use]
    pub fn members(&self) -> &[PeerID] {
        &self.members
    }

    pub fn trust(&self, sim: &mut Sim, other: &PeerGroup) {
        let trust = sim.trust_graph();
        for &a in &self.members {
            for &b in &other.members {
                trust.trust(a, b);
            }
        }
    }

    pub fn untrust(&self, sim: &mut Sim, other: &PeerGroup) {
        let trust = sim.trust_graph();
        for &a in &self.members {
            for &b in &other.members {
                trust.untrust(a, b);
            }
        }
    }

    pub fn connect(&self, sim: &mut Sim, other: &PeerGroup, delay: SimDuration) {
        let network = sim.network();
        for &a in &self.members {
            for &b in &other.members {
                if a != b {
                    network.connect(a, b, delay);
                }
            }
        }
    }

    pub fn disconnect(&self, sim: &mut Sim, other: &PeerGroup) {
        let network = sim.network();
        for &a in &self.members {
            for &b in &other.members {
                network.disconnect(a, b);
            }
        }
    }

    pub fn trust_and_connect(&self, sim: &mut Sim, other: &PeerGroup, delay: SimDuration) {
        self.trust(sim, other);
        other.trust(sim, self);
        self.connect(sim, other, delay);
    }

    #[must_use]
    pub fn union(&self, other: &PeerGroup) -> PeerGroup {
        let mut set: HashSet<PeerID> = self.members.iter().copied().collect();
        set.extend(other.members.iter().copied());
        let mut members: Vec<_> = set.into_iter().collect();
        members.sort();
        PeerGroup { members }
    }

    #[must_use]
    pub fn difference(&self, other: &PeerGroup) -> PeerGroup {
        let exclude: HashSet<PeerID> = other.members.iter().copied().collect();
        let members = self
            .members
            .iter()
            .copied()
            .filter(|id| !exclude.contains(id))
            .collect();
        PeerGroup { members }
    }

    #[must_use]
    pub fn intersection(&self, other: &PeerGroup) -> PeerGroup {
        let keep: HashSet<PeerID> = other.members.iter().copied().collect();
        let members = self
            .members
            .iter()
            .copied()
            .filter(|id| keep.contains(id))
            .collect();
        PeerGroup { members }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerConfig;

    fn fast_config(target: u32) -> PeerConfig {
        let mut c = PeerConfig::default();
        c.target_ledgers = target;
        c
    }

    #[test]
    fn standalone_peer_closes_its_submitted_tx() {
        let mut sim = Sim::new(1);
        let group = sim.create_group(1, fast_config(1)).unwrap();
        group.trust_and_connect(&mut sim, &group, SimDuration::from_millis(1));
        sim.submit_tx(group.members()[0], Tx(1));
        sim.run_for(SimDuration::from_secs(2));

        let results = sim.get_consensus_results();
        assert_eq!(results[0].lcl_seq, 1);
    }

    #[test]
    fn five_peers_converge_on_one_ledger_with_all_txs() {
        let mut sim = Sim::new(2);
        let group = sim.create_group(5, fast_config(1)).unwrap();
        group.trust_and_connect(&mut sim, &group, SimDuration::from_millis(2));
        for (i, &id) in group.members().iter().enumerate() {
            sim.submit_tx(id, Tx(i as u32));
        }
        sim.run_for(SimDuration::from_secs(5));

        assert!(sim.synchronized(&group));
        assert_eq!(sim.branches(&group), 1);
        for summary in sim.get_consensus_results() {
            assert_eq!(summary.lcl_seq, 1);
        }
    }

    #[test]
    fn partitioned_groups_diverge() {
        let mut sim = Sim::new(3);
        let group_a = sim.create_group(3, fast_config(1)).unwrap();
        let group_b = sim.create_group(3, fast_config(1)).unwrap();
        group_a.trust_and_connect(&mut sim, &group_a, SimDuration::from_millis(2));
        group_b.trust_and_connect(&mut sim, &group_b, SimDuration::from_millis(2));
        for (i, &id) in group_a.members().iter().enumerate() {
            sim.submit_tx(id, Tx(i as u32));
        }
        for (i, &id) in group_b.members().iter().enumerate() {
            sim.submit_tx(id, Tx(100 + i as u32));
        }
        sim.run_for(SimDuration::from_secs(5));

        assert!(sim.synchronized(&group_a));
        assert!(sim.synchronized(&group_b));
        let all = group_a.union(&group_b);
        assert_eq!(sim.branches(&all), 2);
    }

    #[test]
    fn peer_group_set_algebra() {
        let a = PeerGroup::new(vec![PeerID(0), PeerID(1), PeerID(2)]);
        let b = PeerGroup::new(vec![PeerID(1), PeerID(2), PeerID(3)]);
        assert_eq!(
            a.union(&b).members(),
            &[PeerID(0), PeerID(1), PeerID(2), PeerID(3)]
        );
        assert_eq!(a.difference(&b).members(), &[PeerID(0)]);
        let mut inter = a.intersection(&b).members().to_vec();
        inter.sort();
        assert_eq!(inter, vec![PeerID(1), PeerID(2)]);
    }
}
