//! The consensus state machine: one `Peer` per simulated node, driving a
//! three-phase round (Open → Establish → Accepted) off heartbeat ticks
//! and inbound gossip.
//!
//! Grounded on the "per-replica simulated state machine driven by
//! dispatched events, holding adapter handles, emitting events on phase
//! transitions" shape in the teacher's VSR replica wrapper, and on its
//! tunable-threshold `ByzantineConfig` style for `PeerConfig`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::events::Event;
use crate::hash::{LedgerID, TxSetID};
use crate::ledger::{Ledger, LedgerOracle};
use crate::network::BasicNetwork;
use crate::router::Router;
use crate::scheduler::Scheduler;
use crate::sim::{EventKind, Payload, PeerID};
use crate::time::{SimDuration, SimTime};
use crate::trust::TrustGraph;
use crate::tx::{Tx, TxSet};
use crate::validations::{AddOutcome, Validation, Validations};
use crate::events::Collectors;

/// Bundles the collaborators a `Sim` owns but a `Peer` only borrows for
/// the duration of one dispatch: the oracle, trust graph, network,
/// scheduler, and collector fan-out. Built fresh per dispatch by
/// destructuring `Sim`'s fields so the peer being mutated (borrowed
/// separately out of `Sim::peers`) and these shared collaborators never
/// alias.
pub(crate) struct Cx<'a> {
    pub(crate) oracle: &'a mut LedgerOracle,
    pub(crate) trust: &'a TrustGraph,
    pub(crate) network: &'a mut BasicNetwork,
    pub(crate) scheduler: &'a mut Scheduler<EventKind>,
    pub(crate) collectors: &'a mut Collectors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Open,
    Establish,
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Observing,
    Proposing,
}

/// A peer's proposed position for the round in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub prev_ledger: LedgerID,
    pub position: TxSet,
    pub close_time: SimTime,
    pub origin_time: SimTime,
    pub node_id: PeerID,
    pub prop_num: u32,
}

/// Tunable timing and fault parameters for a single peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub ledger_min_close: SimDuration,
    pub ledger_max_close: SimDuration,
    pub ledger_min_consensus: SimDuration,
    pub ledger_max_consensus: SimDuration,
    /// Heartbeat period; also the close-time rounding granularity.
    pub ledger_granularity: SimDuration,
    pub propose_interval: SimDuration,
    /// Signed per-peer clock offset, applied only when computing a
    /// proposal's close time (deterministic skew, never real-clock jitter).
    pub clock_skew_ns: i64,
    pub run_as_validator: bool,
    /// Fraction of the UNL that must agree; `threshold = max(1, floor(ratio * unl_size))`.
    pub quorum_ratio: f64,
    pub target_ledgers: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            ledger_min_close: SimDuration::from_millis(50),
            ledger_max_close: SimDuration::from_millis(200),
            ledger_min_consensus: SimDuration::from_millis(100),
            ledger_max_consensus: SimDuration::from_millis(500),
            ledger_granularity: SimDuration::from_millis(10),
            propose_interval: SimDuration::from_millis(20),
            clock_skew_ns: 0,
            run_as_validator: true,
            quorum_ratio: 0.8,
            target_ledgers: 1,
        }
    }
}

pub struct Peer {
    id: PeerID,
    config: PeerConfig,
    started: bool,
    phase: Phase,
    mode: Mode,
    lcl: Ledger,
    fvl: Ledger,
    open_txs: TxSet,
    known_ledgers: HashMap<LedgerID, Ledger>,
    known_txsets: HashMap<TxSetID, TxSet>,
    received_proposals: HashMap<PeerID, Proposal>,
    our_position: Option<Proposal>,
    prop_num: u32,
    round_start: SimTime,
    phase_start: SimTime,
    last_propose_time: SimTime,
    completed_ledgers: u32,
    target_ledgers: u32,
    prev_proposers: usize,
    prev_round_time: SimDuration,
    validations: Validations,
    router: Router,
    byzantine_injections: HashMap<u32, Vec<Tx>>,
    outstanding_ledger_requests: HashMap<LedgerID, SimTime>,
    outstanding_txset_requests: HashMap<TxSetID, SimTime>,
}

impl Peer {
    pub(crate) fn new(id: PeerID, config: PeerConfig, genesis: Ledger) -> Self {
        let target_ledgers = config.target_ledgers;
        Self {
            id,
            config,
            started: false,
            phase: Phase::Open,
            mode: Mode::Observing,
            lcl: genesis.clone(),
            fvl: genesis,
            open_txs: TxSet::new(),
            known_ledgers: HashMap::new(),
            known_txsets: HashMap::new(),
            received_proposals: HashMap::new(),
            our_position: None,
            prop_num: 0,
            round_start: SimTime::ZERO,
            phase_start: SimTime::ZERO,
            last_propose_time: SimTime::ZERO,
            completed_ledgers: 0,
            target_ledgers,
            prev_proposers: 0,
            prev_round_time: SimDuration::ZERO,
            validations: Validations::new(),
            router: Router::new(),
            byzantine_injections: HashMap::new(),
            outstanding_ledger_requests: HashMap::new(),
            outstanding_txset_requests: HashMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PeerID {
        self.id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn lcl(&self) -> &Ledger {
        &self.lcl
    }

    #[must_use]
    pub fn fvl(&self) -> &Ledger {
        &self.fvl
    }

    #[must_use]
    pub fn open_txs(&self) -> &TxSet {
        &self.open_txs
    }

    #[must_use]
    pub fn completed_ledgers(&self) -> u32 {
        self.completed_ledgers
    }

    #[must_use]
    pub fn target_ledgers(&self) -> u32 {
        self.target_ledgers
    }

    #[must_use]
    pub fn prev_proposers(&self) -> usize {
        self.prev_proposers
    }

    #[must_use]
    pub fn prev_round_time(&self) -> SimDuration {
        self.prev_round_time
    }

    pub(crate) fn started(&self) -> bool {
        self.started
    }

    pub fn set_target_ledgers(&mut self, n: u32) {
        self.target_ledgers = n;
    }

    /// Seq-keyed byzantine injection: when this peer accepts a ledger
    /// whose parent has `seq`, `tx` is folded into the accepted txset.
    pub fn inject_tx(&mut self, seq: u32, tx: Tx) {
        self.byzantine_injections.entry(seq).or_default().push(tx);
    }

    pub(crate) fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub(crate) fn start(&mut self, cx: &mut Cx<'_>) {
        self.started = true;
        let now = cx.scheduler.now();
        self.start_round(now, cx);
        cx.scheduler.in_(self.config.ledger_granularity, EventKind::Heartbeat { peer: self.id });
    }

    pub fn submit_tx(&mut self, tx: Tx, cx: &mut Cx<'_>) {
        self.open_txs.insert(tx);
        let now = cx.scheduler.now();
        cx.collectors.dispatch(self.id, now, Event::SubmitTx { tx });
        self.broadcast(cx, Payload::Tx(tx));
    }

    fn start_round(&mut self, when: SimTime, cx: &mut Cx<'_>) {
        debug!(peer = self.id.0, at = %when, lcl_seq = self.lcl.seq(), "starting round");
        cx.collectors.dispatch(
            self.id,
            when,
            Event::StartRound { ledger: self.lcl.id(), proposer: self.id },
        );
        self.get_prev_ledger(self.lcl.id(), &self.lcl.clone(), self.mode, cx, when);
        self.phase = Phase::Open;
        self.mode = if self.config.run_as_validator {
            Mode::Proposing
        } else {
            Mode::Observing
        };
        self.our_position = None;
        self.prop_num = 0;
        self.round_start = when;
        self.phase_start = when;
        self.received_proposals.clear();
    }

    pub(crate) fn on_heartbeat(&mut self, when: SimTime, cx: &mut Cx<'_>) {
        match self.phase {
            Phase::Open => {
                if when.saturating_sub(self.phase_start) >= self.config.ledger_min_close {
                    self.close_ledger(when, cx);
                }
            }
            Phase::Establish => {
                if self.mode == Mode::Proposing
                    && when.saturating_sub(self.last_propose_time) >= self.config.propose_interval
                {
                    if let Some(position) = self.our_position.clone() {
                        self.broadcast(cx, Payload::Proposal(position));
                        self.last_propose_time = when;
                    }
                }
                self.check_consensus(when, cx);
            }
            Phase::Accepted => {}
        }
        if self.completed_ledgers < self.target_ledgers {
            cx.scheduler.in_(self.config.ledger_granularity, EventKind::Heartbeat { peer: self.id });
        }
    }

    fn close_ledger(&mut self, when: SimTime, cx: &mut Cx<'_>) {
        if self.phase != Phase::Open {
            return;
        }
        debug!(peer = self.id.0, at = %when, proposers = self.received_proposals.len(), "closing ledger, entering Establish");
        cx.collectors.dispatch(
            self.id,
            when,
            Event::CloseLedger {
                ledger: self.lcl.id(),
                prior_seq: self.lcl.seq(),
                proposers: self.received_proposals.len(),
            },
        );

        let skewed_now = when.saturating_add_signed(self.config.clock_skew_ns);
        let close_time = skewed_now.round_down(self.config.ledger_granularity);
        self.prop_num += 1;
        let position = self.open_txs.clone();
        let proposal = Proposal {
            prev_ledger: self.lcl.id(),
            position: position.clone(),
            close_time,
            origin_time: when,
            node_id: self.id,
            prop_num: self.prop_num,
        };

        self.known_txsets.insert(position.id(), position);
        self.received_proposals.insert(self.id, proposal.clone());
        self.our_position = Some(proposal.clone());

        if self.mode == Mode::Proposing {
            self.broadcast(cx, Payload::Proposal(proposal));
            self.last_propose_time = when;
        }

        self.phase = Phase::Establish;
        self.phase_start = when;
    }

    fn check_consensus(&mut self, when: SimTime, cx: &mut Cx<'_>) {
        if self.phase != Phase::Establish {
            return;
        }
        let unl_size = cx.trust.unl_size(self.id);
        let threshold = ((self.config.quorum_ratio * unl_size as f64).floor() as u64).max(1);

        let mut votes: HashMap<TxSetID, u64> = HashMap::new();
        for (node, proposal) in &self.received_proposals {
            if cx.trust.trusts(self.id, *node) {
                *votes.entry(proposal.position.id()).or_insert(0) += 1;
            }
        }
        let mut candidates: Vec<(TxSetID, u64)> = votes.into_iter().collect();
        // Count descending, then id ascending: a deterministic tie-break
        // independent of hash-map iteration order.
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let Some(&(winner_id, count)) = candidates.first() else {
            return;
        };

        let elapsed = when.saturating_sub(self.phase_start);
        let has_consensus = count >= threshold && elapsed >= self.config.ledger_min_consensus;
        let timed_out = elapsed >= self.config.ledger_max_consensus;
        if has_consensus || timed_out {
            trace!(peer = self.id.0, votes = count, threshold, timed_out, "consensus reached");
            self.accept_ledger(winner_id, count, when, cx);
        }
    }

    fn accept_ledger(&mut self, winner_txset_id: TxSetID, trusted_count: u64, when: SimTime, cx: &mut Cx<'_>) {
        let mut final_txs = self
            .known_txsets
            .get(&winner_txset_id)
            .cloned()
            .or_else(|| self.our_position.as_ref().map(|p| p.position.clone()))
            .unwrap_or_default();

        if let Some(injected) = self.byzantine_injections.get(&self.lcl.seq()) {
            for tx in injected.clone() {
                final_txs.insert(tx);
            }
        }

        let close_time = self.our_position.as_ref().map_or(when, |p| p.close_time);
        let new_ledger = cx.oracle.accept(&self.lcl, &final_txs, close_time, true, SimDuration::from_secs(30));
        self.known_ledgers.insert(new_ledger.id(), new_ledger.clone());

        debug!(peer = self.id.0, at = %when, seq = new_ledger.seq(), ledger = %new_ledger.id(), "accepted ledger");
        cx.collectors.dispatch(self.id, when, Event::AcceptLedger { ledger: new_ledger.clone() });

        let proposers = self.received_proposals.len();
        self.prev_proposers = proposers.saturating_sub(1);
        self.prev_round_time = when.saturating_sub(self.round_start);

        for tx in final_txs.iter().copied().collect::<Vec<_>>() {
            self.open_txs.remove(&tx);
        }

        self.lcl = new_ledger.clone();
        let _ = trusted_count;

        if self.config.run_as_validator {
            let validation = Validation {
                ledger_id: new_ledger.id(),
                seq: new_ledger.seq(),
                sign_time: when,
                seen_time: when,
                node_id: self.id,
                full: true,
                trusted: true,
            };
            self.broadcast(cx, Payload::Validation(validation));
            self.validations.add(self.id, validation);
        }

        self.check_fully_validated(&new_ledger, when, cx);

        self.completed_ledgers += 1;
        if self.completed_ledgers < self.target_ledgers {
            self.start_round(when, cx);
        } else {
            self.phase = Phase::Accepted;
        }
    }

    fn check_fully_validated(&mut self, ledger: &Ledger, when: SimTime, cx: &mut Cx<'_>) {
        if ledger.seq() <= self.fvl.seq() {
            return;
        }
        let count = self.validations.num_trusted_for_ledger(ledger.id());
        let unl_size = cx.trust.unl_size(self.id);
        let quorum = ((self.config.quorum_ratio * unl_size as f64).floor() as u64).max(1);
        if count >= quorum && ledger.is_ancestor(&self.fvl, cx.oracle) {
            debug!(peer = self.id.0, at = %when, seq = ledger.seq(), count, quorum, "fully validated ledger");
            cx.collectors.dispatch(self.id, when, Event::FullyValidateLedger { ledger: ledger.clone() });
            self.fvl = ledger.clone();
        }
    }

    /// `ledger.seq == 0` is the genesis override (returns `id` unchanged).
    /// Otherwise asks the validations store for the network's preferred
    /// ledger past `fvl.seq`; a mismatch against `id` is reported but does
    /// not itself rewrite `lcl` — the next round's proposals converge on
    /// it through ordinary consensus instead.
    fn get_prev_ledger(&mut self, id: LedgerID, ledger: &Ledger, _mode: Mode, cx: &mut Cx<'_>, when: SimTime) -> LedgerID {
        if ledger.seq() == 0 {
            return id;
        }
        let net = self.validations.get_preferred(ledger, self.fvl.seq());
        if net != id {
            trace!(peer = self.id.0, wrong = %id, correct = %net, "wrong previous ledger");
            cx.collectors.dispatch(self.id, when, Event::WrongPrevLedger { wrong: id, correct: net });
        }
        net
    }

    pub(crate) fn on_proposal(&mut self, when: SimTime, origin: PeerID, proposal: Proposal, cx: &mut Cx<'_>) {
        if cx.trust.trusts(self.id, origin) {
            self.known_txsets.entry(proposal.position.id()).or_insert_with(|| proposal.position.clone());
            self.received_proposals.insert(origin, proposal.clone());
            cx.collectors.dispatch(self.id, when, Event::ReceiveProposal { proposal: proposal.clone() });
            if self.phase == Phase::Establish {
                self.check_consensus(when, cx);
            }
        } else if proposal.prev_ledger == self.lcl.id() {
            self.broadcast_except(cx, origin, Payload::Proposal(proposal));
        }
    }

    pub(crate) fn on_txset(&mut self, txset: TxSet) {
        let id = txset.id();
        self.known_txsets.entry(id).or_insert(txset);
        self.outstanding_txset_requests.remove(&id);
    }

    pub(crate) fn on_tx(&mut self, _when: SimTime, origin: PeerID, tx: Tx, cx: &mut Cx<'_>) {
        if self.lcl.txset().contains(&tx) || self.open_txs.contains(&tx) {
            return;
        }
        self.open_txs.insert(tx);
        self.broadcast_except(cx, origin, Payload::Tx(tx));
    }

    pub(crate) fn on_validation(&mut self, when: SimTime, origin: PeerID, mut validation: Validation, cx: &mut Cx<'_>) {
        if !cx.trust.trusts(self.id, origin) {
            return;
        }
        validation.trusted = true;
        validation.seen_time = when;
        let outcome = self.validations.add(origin, validation);
        cx.collectors.dispatch(self.id, when, Event::ReceiveValidation { validation });
        if outcome != AddOutcome::Stale {
            if let Some(ledger) = self.known_ledgers.get(&validation.ledger_id).cloned() {
                self.check_fully_validated(&ledger, when, cx);
            }
        }
    }

    /// Returns a cached ledger if known; otherwise records (or refreshes,
    /// past `2 * min_edge_delay`) an outstanding-request marker. No
    /// inbound responder exists for this request — absent ledgers stay
    /// absent until they arrive through ordinary gossip (§4.8.9).
    pub fn acquire_ledger(&mut self, id: LedgerID, when: SimTime, min_edge_delay: SimDuration) -> Option<Ledger> {
        if let Some(ledger) = self.known_ledgers.get(&id) {
            return Some(ledger.clone());
        }
        let timeout = SimDuration::from_nanos(min_edge_delay.as_nanos() * 2);
        let stale = self
            .outstanding_ledger_requests
            .get(&id)
            .is_none_or(|&last| when.saturating_sub(last) >= timeout);
        if stale {
            self.outstanding_ledger_requests.insert(id, when);
        }
        None
    }

    pub fn acquire_tx_set(&mut self, id: TxSetID, when: SimTime, min_edge_delay: SimDuration) -> Option<TxSet> {
        if let Some(txset) = self.known_txsets.get(&id) {
            return Some(txset.clone());
        }
        let timeout = SimDuration::from_nanos(min_edge_delay.as_nanos() * 2);
        let stale = self
            .outstanding_txset_requests
            .get(&id)
            .is_none_or(|&last| when.saturating_sub(last) >= timeout);
        if stale {
            self.outstanding_txset_requests.insert(id, when);
        }
        None
    }

    fn broadcast(&mut self, cx: &mut Cx<'_>, payload: Payload) {
        let seq = self.router.next_seq(self.id);
        for to in cx.network.peers(self.id) {
            if let Some(delay) = cx.network.get_delay(self.id, to) {
                cx.scheduler.in_(delay, EventKind::Deliver { to, origin: self.id, seq, payload: payload.clone() });
            }
        }
    }

    fn broadcast_except(&mut self, cx: &mut Cx<'_>, exclude: PeerID, payload: Payload) {
        let seq = self.router.next_seq(self.id);
        for to in cx.network.peers(self.id) {
            if to == exclude {
                continue;
            }
            if let Some(delay) = cx.network.get_delay(self.id, to) {
                cx.scheduler.in_(delay, EventKind::Deliver { to, origin: self.id, seq, payload: payload.clone() });
            }
        }
    }
}
