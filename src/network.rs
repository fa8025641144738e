//! Deterministic point-to-point network: fixed per-edge delay, explicit
//! connect/disconnect, delivery scheduled through the simulation clock.

use std::collections::HashMap;

use crate::sim::PeerID;
use crate::time::SimDuration;

#[derive(Debug, Clone, Copy)]
struct Link {
    delay: SimDuration,
}

/// Bidirectional links between peers with a fixed one-way delay each.
///
/// Connectivity is re-checked at delivery time, not send time: messages
/// in flight when a link is torn down are silently dropped on arrival
/// rather than recalled (see `src/sim.rs`'s `Deliver` handling).
#[derive(Debug, Clone, Default)]
pub struct BasicNetwork {
    links: HashMap<(PeerID, PeerID), Link>,
}

fn edge_key(a: PeerID, b: PeerID) -> (PeerID, PeerID) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}

impl BasicNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a self-loop (`a == b`) or a duplicate connection between an
    /// already-linked pair: returns `false`, no effect either way.
    pub fn connect(&mut self, a: PeerID, b: PeerID, delay: SimDuration) -> bool {
        if a == b {
            return false;
        }
        let key = edge_key(a, b);
        if self.links.contains_key(&key) {
            return false;
        }
        self.links.insert(key, Link { delay });
        true
    }

    pub fn disconnect(&mut self, a: PeerID, b: PeerID) -> bool {
        self.links.remove(&edge_key(a, b)).is_some()
    }

    #[must_use]
    pub fn is_connected(&self, a: PeerID, b: PeerID) -> bool {
        self.links.contains_key(&edge_key(a, b))
    }

    #[must_use]
    pub fn get_delay(&self, a: PeerID, b: PeerID) -> Option<SimDuration> {
        self.links.get(&edge_key(a, b)).map(|l| l.delay)
    }

    /// Every peer directly linked to `from`, sorted ascending by `PeerID`.
    ///
    /// The backing map is a `HashMap`, whose iteration order varies per
    /// process (`RandomState`); callers (`Peer::broadcast`/
    /// `broadcast_except`) enqueue one `Deliver` per entry at equal `when`,
    /// and the scheduler breaks same-`when` ties by enqueue order, so an
    /// unsorted result would make delivery order nondeterministic across
    /// runs. Sorting here pins it, per §9's "iterate in a stable order" note.
    #[must_use]
    pub fn peers(&self, from: PeerID) -> Vec<PeerID> {
        let mut out: Vec<PeerID> = self
            .links
            .keys()
            .filter_map(|&(a, b)| {
                if a == from {
                    Some(b)
                } else if b == from {
                    Some(a)
                } else {
                    None
                }
            })
            .collect();
        out.sort();
        out
    }

    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_symmetric() {
        let mut net = BasicNetwork::new();
        net.connect(PeerID(0), PeerID(1), SimDuration::from_millis(10));
        assert!(net.is_connected(PeerID(0), PeerID(1)));
        assert!(net.is_connected(PeerID(1), PeerID(0)));
        assert_eq!(
            net.get_delay(PeerID(1), PeerID(0)),
            Some(SimDuration::from_millis(10))
        );
    }

    #[test]
    fn connect_rejects_self_loop() {
        let mut net = BasicNetwork::new();
        assert!(!net.connect(PeerID(0), PeerID(0), SimDuration::from_millis(1)));
        assert!(!net.is_connected(PeerID(0), PeerID(0)));
    }

    #[test]
    fn connect_rejects_duplicate_and_keeps_original_delay() {
        let mut net = BasicNetwork::new();
        assert!(net.connect(PeerID(0), PeerID(1), SimDuration::from_millis(5)));
        assert!(!net.connect(PeerID(1), PeerID(0), SimDuration::from_millis(9)));
        assert_eq!(net.get_delay(PeerID(0), PeerID(1)), Some(SimDuration::from_millis(5)));
    }

    #[test]
    fn disconnect_removes_both_directions() {
        let mut net = BasicNetwork::new();
        net.connect(PeerID(0), PeerID(1), SimDuration::from_millis(5));
        assert!(net.disconnect(PeerID(1), PeerID(0)));
        assert!(!net.is_connected(PeerID(0), PeerID(1)));
    }

    #[test]
    fn disconnect_unknown_link_returns_false() {
        let mut net = BasicNetwork::new();
        assert!(!net.disconnect(PeerID(0), PeerID(1)));
    }

    #[test]
    fn peers_lists_all_direct_links() {
        let mut net = BasicNetwork::new();
        net.connect(PeerID(0), PeerID(1), SimDuration::from_millis(1));
        net.connect(PeerID(0), PeerID(2), SimDuration::from_millis(1));
        let mut p = net.peers(PeerID(0));
        p.sort();
        assert_eq!(p, vec![PeerID(1), PeerID(2)]);
    }

    #[test]
    fn get_delay_on_unconnected_pair_is_none() {
        let net = BasicNetwork::new();
        assert_eq!(net.get_delay(PeerID(0), PeerID(1)), None);
    }
}
