//! In-process node for local runs and tests.
//!
//! A [`SimulatedNode`] produces one block per `block_time` once started.
//! Block hashes are `blake3(chain_id, height)`, so every node of a chain
//! agrees on every hash without talking to the others. Downstream nodes
//! start at their trusted checkpoint and report syncing for `sync_delay`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rendezvous_bootstrap::AccountFunder;
use rendezvous_core::BoxError;
use rendezvous_network::AccountAddress;
use rendezvous_network::BlockHash;
use rendezvous_network::Role;
use rendezvous_topology::HeightSource;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;

use crate::lifecycle::NodeIdentity;
use crate::lifecycle::NodeLifecycle;
use crate::lifecycle::NodeStartOptions;

/// Behaviour of a [`SimulatedNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedNodeOptions {
    /// Namespace the node id is derived from (usually the run id).
    pub namespace: String,
    pub global_seq: u32,
    pub block_time: Duration,
    /// Time `start` takes before the node serves queries.
    pub boot_delay: Duration,
    /// Time a node started from a checkpoint reports syncing.
    pub sync_delay: Duration,
    /// Stop producing blocks at this height.
    pub stall_at: Option<u64>,
    /// Make `start` fail with this reason.
    pub fail_start: Option<String>,
}

impl SimulatedNodeOptions {
    pub fn new(namespace: impl Into<String>, global_seq: u32, block_time: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            global_seq,
            block_time,
            boot_delay: Duration::ZERO,
            sync_delay: block_time,
            stall_at: None,
            fail_start: None,
        }
    }
}

#[derive(Debug)]
struct Running {
    chain_id: String,
    role: Role,
    started_at: Instant,
    base_height: u64,
}

pub struct SimulatedNode {
    options: SimulatedNodeOptions,
    identity: NodeIdentity,
    running: RwLock<Option<Running>>,
    balances: RwLock<HashMap<AccountAddress, u64>>,
}

impl SimulatedNode {
    pub fn new(options: SimulatedNodeOptions) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"node-id");
        hasher.update(options.namespace.as_bytes());
        hasher.update(&options.global_seq.to_be_bytes());
        let node_id = hasher.finalize().to_hex()[..40].to_string();
        Self {
            options,
            identity: NodeIdentity { node_id },
            running: RwLock::new(None),
            balances: RwLock::new(HashMap::new()),
        }
    }

    /// Hash every honest node of `chain_id` reports for `height`.
    pub fn block_hash(chain_id: &str, height: u64) -> BlockHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(chain_id.as_bytes());
        hasher.update(&height.to_be_bytes());
        BlockHash(*hasher.finalize().as_bytes())
    }

    pub fn is_running(&self) -> bool {
        self.running.read().is_some()
    }

    /// Funds received by `account` through this node.
    pub fn balance(&self, account: &AccountAddress) -> u64 {
        self.balances.read().get(account).copied().unwrap_or(0)
    }

    fn current_height(&self, running: &Running) -> u64 {
        let block_ms = self.options.block_time.as_millis().max(1);
        let produced = (running.started_at.elapsed().as_millis() / block_ms) as u64;
        let height = running.base_height.saturating_add(produced);
        match self.options.stall_at {
            Some(stall) => height.min(stall.max(running.base_height)),
            None => height,
        }
    }

    fn with_running<T>(&self, f: impl FnOnce(&Running) -> T) -> Result<T, BoxError> {
        match self.running.read().as_ref() {
            Some(running) => Ok(f(running)),
            None => Err("node is not running".into()),
        }
    }
}

#[async_trait]
impl HeightSource for SimulatedNode {
    async fn latest_height(&self) -> Result<u64, BoxError> {
        self.with_running(|running| self.current_height(running))
    }

    async fn height_hash(&self, height: u64) -> Result<BlockHash, BoxError> {
        let (chain_id, latest) = self.with_running(|running| (running.chain_id.clone(), self.current_height(running)))?;
        if height == 0 || height > latest {
            return Err(format!("no block at height {height} (latest {latest})").into());
        }
        Ok(Self::block_hash(&chain_id, height))
    }
}

#[async_trait]
impl AccountFunder for SimulatedNode {
    async fn fund_account(&self, account: &AccountAddress, amount: u64) -> Result<(), BoxError> {
        self.with_running(|_| ())?;
        let mut balances = self.balances.write();
        let balance = balances.entry(account.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
        debug!(node_id = %self.identity.node_id, account = %account, amount, "funded account");
        Ok(())
    }
}

#[async_trait]
impl NodeLifecycle for SimulatedNode {
    async fn start(&self, options: NodeStartOptions) -> Result<(), BoxError> {
        if let Some(reason) = &self.options.fail_start {
            return Err(reason.clone().into());
        }
        if self.is_running() {
            return Err("node is already running".into());
        }
        if options.config.chain_id.is_empty() {
            return Err("node config has no chain id".into());
        }

        if !self.options.boot_delay.is_zero() {
            tokio::time::sleep(self.options.boot_delay).await;
        }

        let base_height = options.trusted_checkpoint.map(|checkpoint| checkpoint.height).unwrap_or(1);
        *self.running.write() = Some(Running {
            chain_id: options.config.chain_id.clone(),
            role: options.role,
            started_at: Instant::now(),
            base_height,
        });
        info!(
            node_id = %self.identity.node_id,
            role = %options.role,
            home = %options.home.display(),
            base_height,
            upstream = ?options.upstream,
            "simulated node started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), BoxError> {
        match self.running.write().take() {
            Some(running) => {
                info!(node_id = %self.identity.node_id, role = %running.role, "simulated node stopped");
                Ok(())
            }
            None => Err("node is not running".into()),
        }
    }

    fn identity(&self) -> NodeIdentity {
        self.identity.clone()
    }

    async fn is_syncing(&self) -> Result<bool, BoxError> {
        self.with_running(|running| {
            running.base_height > 1 && running.started_at.elapsed() < self.options.sync_delay
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rendezvous_network::TrustedCheckpoint;

    use super::*;
    use crate::lifecycle::NodeConfig;

    fn start_options(role: Role, checkpoint: Option<TrustedCheckpoint>) -> NodeStartOptions {
        NodeStartOptions {
            home: PathBuf::from("/tmp/sim"),
            role,
            config: NodeConfig {
                chain_id: "sim-chain".into(),
                ..NodeConfig::default()
            },
            trusted_checkpoint: checkpoint,
            upstream: None,
        }
    }

    fn node(seq: u32) -> SimulatedNode {
        SimulatedNode::new(SimulatedNodeOptions::new("sim", seq, Duration::from_millis(5)))
    }

    #[tokio::test]
    async fn test_queries_fail_before_start() {
        let node = node(1);
        assert!(node.latest_height().await.is_err());
        assert!(node.fund_account(&AccountAddress("rdv1a".into()), 1).await.is_err());
        assert!(node.stop().await.is_err());
    }

    #[tokio::test]
    async fn test_height_grows_and_hashes_agree_across_nodes() {
        let a = node(1);
        let b = node(2);
        a.start(start_options(Role::Validator, None)).await.unwrap();
        b.start(start_options(Role::Validator, None)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let height = a.latest_height().await.unwrap();
        assert!(height >= 3, "height {height}");
        assert_eq!(a.height_hash(2).await.unwrap(), b.height_hash(2).await.unwrap());
        assert!(a.height_hash(height + 1_000).await.is_err());
    }

    #[tokio::test]
    async fn test_checkpoint_start_syncs_from_checkpoint() {
        let mut options = SimulatedNodeOptions::new("sim", 3, Duration::from_millis(5));
        options.sync_delay = Duration::from_secs(5);
        let node = SimulatedNode::new(options);
        let checkpoint = TrustedCheckpoint {
            height: 40,
            hash: SimulatedNode::block_hash("sim-chain", 40),
        };
        node.start(start_options(Role::Bridge, Some(checkpoint))).await.unwrap();
        assert!(node.latest_height().await.unwrap() >= 40);
        assert!(node.is_syncing().await.unwrap());
        assert_eq!(node.height_hash(40).await.unwrap(), checkpoint.hash);
    }

    #[tokio::test]
    async fn test_stalled_node_stops_growing() {
        let mut options = SimulatedNodeOptions::new("sim", 4, Duration::from_millis(2));
        options.stall_at = Some(2);
        let node = SimulatedNode::new(options);
        node.start(start_options(Role::Validator, None)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(node.latest_height().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_funding_and_failure_injection() {
        let node = node(5);
        node.start(start_options(Role::Validator, None)).await.unwrap();
        let account = AccountAddress("rdv1funded".into());
        node.fund_account(&account, 10).await.unwrap();
        node.fund_account(&account, 5).await.unwrap();
        assert_eq!(node.balance(&account), 15);
        node.stop().await.unwrap();
        assert!(!node.is_running());

        let mut options = SimulatedNodeOptions::new("sim", 6, Duration::from_millis(5));
        options.fail_start = Some("disk full".into());
        let broken = SimulatedNode::new(options);
        let err = broken.start(start_options(Role::Full, None)).await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_identity_is_stable_per_seq() {
        assert_eq!(node(1).identity(), node(1).identity());
        assert_ne!(node(1).identity(), node(2).identity());
    }
}
