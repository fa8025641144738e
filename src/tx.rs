//! Transactions and transaction sets.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::{hash_txset, TxSetID};

/// An opaque transaction identity — just a 32-bit id, per this simulation's
/// "a tx is an opaque integer" non-goal on transaction semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tx(pub u32);

impl fmt::Display for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tx({})", self.0)
    }
}

/// A set of [`Tx`], with a cached content hash.
///
/// Iteration is always in ascending `id` order (`BTreeSet` gives us this for
/// free, which also makes `id()` a direct hash over sorted ids).
#[derive(Debug, Clone, Default)]
pub struct TxSet {
    txs: BTreeSet<Tx>,
    cached_id: Cell<Option<TxSetID>>,
}

impl TxSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tx: Tx) -> bool {
        let inserted = self.txs.insert(tx);
        if inserted {
            self.cached_id.set(None);
        }
        inserted
    }

    pub fn remove(&mut self, tx: &Tx) -> bool {
        let removed = self.txs.remove(tx);
        if removed {
            self.cached_id.set(None);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, tx: &Tx) -> bool {
        self.txs.contains(tx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tx> {
        self.txs.iter()
    }

    /// `SHA-256` over the ascending tx ids, cached until the next mutation.
    #[must_use]
    pub fn id(&self) -> TxSetID {
        if let Some(id) = self.cached_id.get() {
            return id;
        }
        let ids: Vec<u32> = self.txs.iter().map(|t| t.0).collect();
        let id = hash_txset(&ids);
        self.cached_id.set(Some(id));
        id
    }
}

impl FromIterator<Tx> for TxSet {
    fn from_iter<I: IntoIterator<Item = Tx>>(iter: I) -> Self {
        let mut set = TxSet::new();
        for tx in iter {
            set.insert(tx);
        }
        set
    }
}

/// Serializes as the ascending list of member txs; the hash cache is
/// transient and recomputed lazily on first `id()` call after decode.
impl Serialize for TxSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.txs.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TxSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let txs = BTreeSet::<Tx>::deserialize(deserializer)?;
        Ok(Self { txs, cached_id: Cell::new(None) })
    }
}
