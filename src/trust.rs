//! Directed trust graph: each peer's unique node list (UNL).

use std::collections::{HashMap, HashSet};

use crate::sim::PeerID;

/// `trust(a, b)` means `a` includes `b` in its UNL. Not assumed symmetric.
#[derive(Debug, Clone, Default)]
pub struct TrustGraph {
    trusts: HashMap<PeerID, HashSet<PeerID>>,
}

impl TrustGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trust(&mut self, from: PeerID, to: PeerID) {
        self.trusts.entry(from).or_default().insert(to);
    }

    pub fn untrust(&mut self, from: PeerID, to: PeerID) -> bool {
        self.trusts.get_mut(&from).is_some_and(|set| set.remove(&to))
    }

    #[must_use]
    pub fn trusts(&self, from: PeerID, to: PeerID) -> bool {
        self.trusts.get(&from).is_some_and(|set| set.contains(&to))
    }

    /// `from`'s full UNL, in an unspecified order.
    #[must_use]
    pub fn trusted_peers(&self, from: PeerID) -> Vec<PeerID> {
        self.trusts
            .get(&from)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every peer that trusts `to`.
    #[must_use]
    pub fn trusting_peers(&self, to: PeerID) -> Vec<PeerID> {
        self.trusts
            .iter()
            .filter(|(_, set)| set.contains(&to))
            .map(|(&from, _)| from)
            .collect()
    }

    #[must_use]
    pub fn unl_size(&self, from: PeerID) -> usize {
        self.trusts.get(&from).map_or(0, HashSet::len)
    }

    pub fn clear(&mut self, from: PeerID) {
        self.trusts.remove(&from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_is_not_implicitly_symmetric() {
        let mut g = TrustGraph::new();
        g.trust(PeerID(0), PeerID(1));
        assert!(g.trusts(PeerID(0), PeerID(1)));
        assert!(!g.trusts(PeerID(1), PeerID(0)));
    }

    #[test]
    fn untrust_removes_single_edge() {
        let mut g = TrustGraph::new();
        g.trust(PeerID(0), PeerID(1));
        g.trust(PeerID(0), PeerID(2));
        assert!(g.untrust(PeerID(0), PeerID(1)));
        assert!(!g.trusts(PeerID(0), PeerID(1)));
        assert!(g.trusts(PeerID(0), PeerID(2)));
    }

    #[test]
    fn untrust_unknown_edge_returns_false() {
        let mut g = TrustGraph::new();
        assert!(!g.untrust(PeerID(0), PeerID(1)));
    }

    #[test]
    fn trusting_peers_finds_all_inbound_edges() {
        let mut g = TrustGraph::new();
        g.trust(PeerID(0), PeerID(2));
        g.trust(PeerID(1), PeerID(2));
        let mut inbound = g.trusting_peers(PeerID(2));
        inbound.sort();
        assert_eq!(inbound, vec![PeerID(0), PeerID(1)]);
    }

    #[test]
    fn unl_size_reflects_trust_count() {
        let mut g = TrustGraph::new();
        assert_eq!(g.unl_size(PeerID(0)), 0);
        g.trust(PeerID(0), PeerID(1));
        g.trust(PeerID(0), PeerID(2));
        assert_eq!(g.unl_size(PeerID(0)), 2);
    }

    #[test]
    fn clear_drops_all_outgoing_trust() {
        let mut g = TrustGraph::new();
        g.trust(PeerID(0), PeerID(1));
        g.clear(PeerID(0));
        assert_eq!(g.unl_size(PeerID(0)), 0);
    }
}
