//! The node driver seam.
//!
//! Coordination never runs a chain itself. It drives a node through
//! [`NodeLifecycle`]: start it with what the protocol produced, query its
//! height, fund accounts through it, stop it at teardown.

use std::path::PathBuf;

use async_trait::async_trait;
use rendezvous_bootstrap::AccountFunder;
use rendezvous_core::BoxError;
use rendezvous_network::Role;
use rendezvous_network::TrustedCheckpoint;
use rendezvous_topology::HeightSource;
use serde::Deserialize;
use serde::Serialize;

/// Node-level settings produced by coordination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub chain_id: String,
    /// Final genesis document. Validators and seeds only.
    pub genesis: Option<Vec<u8>>,
    /// Peers the node keeps connections to, as multiaddrs.
    pub persistent_peers: Vec<String>,
    /// Seed nodes for peer discovery, as multiaddrs.
    pub seeds: Vec<String>,
    /// Address the node listens on, as a multiaddr.
    pub listen_address: String,
}

/// Everything a node needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStartOptions {
    pub home: PathBuf,
    pub role: Role,
    pub config: NodeConfig,
    /// Sync root of downstream nodes; used verbatim.
    pub trusted_checkpoint: Option<TrustedCheckpoint>,
    /// Multiaddr of the upstream service a downstream node connects to.
    pub upstream: Option<String>,
}

/// Stable identity of a node, known before it starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub node_id: String,
}

/// Drives one chain node.
///
/// Queries before [`start`](Self::start) completes may fail; callers that
/// wait on height treat such errors as "not yet".
#[async_trait]
pub trait NodeLifecycle: HeightSource + AccountFunder + Send + Sync {
    async fn start(&self, options: NodeStartOptions) -> Result<(), BoxError>;

    async fn stop(&self) -> Result<(), BoxError>;

    fn identity(&self) -> NodeIdentity;

    /// True while the node is still catching up to its upstream.
    async fn is_syncing(&self) -> Result<bool, BoxError>;
}
