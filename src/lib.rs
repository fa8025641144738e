//! # csf: a deterministic discrete-event simulator for a Ripple/XRPL-style
//! federated Byzantine agreement protocol.
//!
//! `csf` wires N simulated peers into a configurable trust graph and
//! network topology, injects transactions and fault conditions, and
//! advances a virtual clock until the peers converge on a sequence of
//! ledgers. It exists to let researchers test safety (no forks) and
//! liveness (ledgers keep closing) under adversarial conditions without
//! real time, real sockets, or real threads.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                             Sim                                │
//! │  ┌───────────┐  ┌─────────────┐  ┌───────────┐  ┌───────────┐ │
//! │  │ Scheduler │  │ LedgerOracle│  │ TrustGraph│  │BasicNetwork│ │
//! │  │ (vtime)   │  │ (interning) │  │ (UNLs)    │  │ (delay)    │ │
//! │  └───────────┘  └─────────────┘  └───────────┘  └───────────┘ │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │      peer arena: Vec<Peer>, addressed by PeerID          │  │
//! │  │  each Peer: Router + Validations + round state machine   │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │           Collectors: fan-out Event sink                 │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```
//! use csf::{PeerConfig, Sim, Tx};
//! use csf::time::SimDuration;
//!
//! let mut sim = Sim::new(42);
//! let mut config = PeerConfig::default();
//! config.target_ledgers = 1;
//! let group = sim.create_group(5, config).unwrap();
//! group.trust_and_connect(&mut sim, &group, SimDuration::from_millis(2));
//! for (i, &peer) in group.members().iter().enumerate() {
//!     sim.submit_tx(peer, Tx(i as u32));
//! }
//! sim.run(1);
//! assert!(sim.synchronized(&group));
//! ```
//!
//! ## Key concepts
//!
//! - [`time::SimTime`] / [`time::SimDuration`]: nanosecond-resolution
//!   virtual time, monotonic from zero.
//! - [`scheduler::Scheduler`]: the virtual-time priority queue everything
//!   else is driven by.
//! - [`tx::Tx`] / [`tx::TxSet`]: an opaque transaction id and the sets of
//!   them peers propose.
//! - [`ledger::Ledger`] / [`ledger::LedgerOracle`]: immutable,
//!   content-addressed ledgers and the oracle that interns them.
//! - [`trust::TrustGraph`]: each peer's unique node list.
//! - [`network::BasicNetwork`]: fixed per-edge delay, delivery scheduled
//!   through the [`scheduler::Scheduler`].
//! - [`peer::Peer`]: the per-node Open → Establish → Accepted round state
//!   machine.
//! - [`sim::Sim`] / [`sim::PeerGroup`]: the façade that owns everything
//!   above and drives a run.

pub mod error;
pub mod events;
pub mod hash;
pub mod ledger;
pub mod network;
pub mod peer;
pub mod router;
pub mod scheduler;
pub mod sim;
pub mod time;
pub mod trust;
pub mod tx;
pub mod validations;

pub use error::SimError;
pub use events::{Collector, Event, NullCollector, VecCollector};
pub use hash::{LedgerID, TxSetID};
pub use ledger::{Ledger, LedgerOracle};
pub use network::BasicNetwork;
pub use peer::{Mode, Peer, PeerConfig, Phase, Proposal};
pub use router::Router;
pub use sim::{PeerGroup, PeerID, PeerSummary, Sim};
pub use time::{SimDuration, SimTime};
pub use trust::TrustGraph;
pub use tx::{Tx, TxSet};
pub use validations::{AddOutcome, Validation, Validations};
