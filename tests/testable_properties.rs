//! Universally-quantified properties from spec §8, checked with `proptest`
//! over the public API: canonical `TxSet` hash order-independence, ledger
//! ancestor transitivity, and per-sender dedup at-most-once.

use std::collections::BTreeSet;

use csf::ledger::LedgerOracle;
use csf::router::Router;
use csf::time::{SimDuration, SimTime};
use csf::{Tx, TxSet};
use proptest::prelude::*;

proptest! {
    /// Any two insertion orders of the same tx ids produce the same
    /// content hash (spec §4's canonical `TxSet` hash).
    #[test]
    fn txset_hash_is_order_independent(
        ids in prop::collection::hash_set(0u32..1000, 0..30),
        seed in 0u64..10_000,
    ) {
        let ids: Vec<u32> = ids.into_iter().collect();
        let mut shuffled = ids.clone();
        // Deterministic shuffle keyed on `seed`, no real RNG involved.
        shuffled.sort_by_key(|&id| (id.wrapping_mul(2_654_435_761).wrapping_add(seed as u32)));

        let a: TxSet = ids.iter().copied().map(Tx).collect();
        let b: TxSet = shuffled.iter().copied().map(Tx).collect();
        prop_assert_eq!(a.id(), b.id());
    }

    /// A ledger at the end of a chain of `n` accepted ledgers is an
    /// ancestor of every earlier ledger in that chain, and of genesis.
    #[test]
    fn ledger_ancestry_is_transitive_over_arbitrary_chain_lengths(n in 1u32..20) {
        let mut oracle = LedgerOracle::new();
        let genesis = oracle.genesis();
        let mut chain = Vec::new();
        let mut parent = genesis.clone();
        for i in 0..n {
            let mut txset = TxSet::new();
            txset.insert(Tx(i));
            let child = oracle.accept(
                &parent,
                &txset,
                SimTime::from_nanos(u64::from(i) + 1),
                true,
                SimDuration::ZERO,
            );
            chain.push(child.clone());
            parent = child;
        }

        let tip = chain.last().unwrap();
        for earlier in &chain[..chain.len() - 1] {
            prop_assert!(tip.is_ancestor(earlier, &oracle));
        }
        prop_assert!(tip.is_ancestor(&genesis, &oracle));
        prop_assert!(!genesis.is_ancestor(tip, &oracle));
    }

    /// A `Router` accepts a sequence from one origin at most once per
    /// value, in any arrival order: the accepted subsequence is exactly
    /// the set of values strictly greater than every value seen before
    /// them in arrival order.
    #[test]
    fn router_dedup_is_at_most_once_per_value(seqs in prop::collection::vec(0u64..50, 0..40)) {
        let mut router = Router::new();
        let origin = csf::PeerID(0);

        let mut accepted = BTreeSet::new();
        let mut running_max: Option<u64> = None;
        for &seq in &seqs {
            let expect_accept = running_max.is_none_or(|m| seq > m);
            let actually_accepted = router.should_process(origin, seq);
            prop_assert_eq!(actually_accepted, expect_accept);
            if actually_accepted {
                prop_assert!(accepted.insert(seq), "value {} accepted twice", seq);
                running_max = Some(seq);
            }
        }
    }
}
