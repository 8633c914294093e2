//! Service descriptor propagation between tiers.
//!
//! Upstream instances (validators for bridges, bridges for full and light
//! nodes, full nodes for light nodes) prove their node is live and then
//! publish one [`ServiceDescriptor`]. Downstream instances pick the single
//! upstream in their partition with [`resolve_upstream`] and adopt its
//! trusted checkpoint as their sync root.
//!
//! [`ServiceDescriptor`]: rendezvous_network::ServiceDescriptor

pub mod announce;
pub mod error;
pub mod pure;
pub mod resolve;

pub use announce::AnnounceParams;
pub use announce::HeightSource;
pub use announce::announce_service;
pub use announce::wait_for_height;
pub use error::TopologyError;
pub use pure::descriptor_matches;
pub use pure::is_partition_match;
pub use pure::select_descriptor;
pub use resolve::resolve_upstream;
