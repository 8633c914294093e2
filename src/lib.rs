//! Rendezvous: bootstrap coordination for ephemeral multi-role test networks.
//!
//! Every instance of a run (validators, seeds, bridges, full nodes, light
//! nodes) shares nothing but a key-value store. Through it they agree on a
//! genesis, exchange peers, fund accounts, and hand trusted checkpoints
//! down the tiers until every node is synced.
//!
//! # Crates
//!
//! - [`rendezvous_core`]: the [`KeyValueStore`] seam, the in-memory backend,
//!   and [`RunDeadline`]
//! - [`rendezvous_sync`]: topics and barriers over the store
//! - [`rendezvous_network`]: roles, addressing, and the wire types
//! - [`rendezvous_bootstrap`]: genesis, peer exchange, and funding
//! - `rendezvous_topology`: service announcement and upstream selection
//! - [`rendezvous_node`]: role drivers, run configuration, and the instance
//!   runner
//!
//! This crate adds [`LocalNetwork`], which runs a whole network of
//! simulated nodes in one process.

pub mod network;

pub use network::LocalNetwork;
pub use network::RunReport;
pub use rendezvous_core::DeterministicKeyValueStore;
pub use rendezvous_core::KeyValueStore;
pub use rendezvous_core::RunDeadline;
pub use rendezvous_network::Instance;
pub use rendezvous_network::Role;
pub use rendezvous_node::FailureKind;
pub use rendezvous_node::InstanceOutcome;
pub use rendezvous_node::LightUpstream;
pub use rendezvous_node::RunConfig;
pub use rendezvous_node::SimulatedNode;
pub use rendezvous_node::SimulatedNodeOptions;
