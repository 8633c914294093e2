//! Per-role test-case logic.
//!
//! Each role strings coordination stages together around its node. Teardown
//! runs downstream first: light nodes finish immediately, full nodes wait
//! for every light node, bridges for every light and full node, seeds for
//! everything below them, and validators for everyone else. A downstream
//! instance that failed counts as done; its live peers are still waited for.

mod bridge;
mod full;
mod light;
mod seed;
mod validator;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use rendezvous_bootstrap::GenesisToolkit;
use rendezvous_core::RunDeadline;
use rendezvous_network::AccountAddress;
use rendezvous_network::Instance;
use rendezvous_network::PeerInfo;
use rendezvous_network::Role;
use rendezvous_network::ServiceDescriptor;
use rendezvous_network::assign_address;
use rendezvous_network::protocol::finished_state;
use rendezvous_sync::SyncClient;
use rendezvous_topology::AnnounceParams;
use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;
use toml::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::RunConfig;
use crate::config_editor::ConfigEditor;
use crate::error::LifecycleSnafu;
use crate::error::NodeError;
use crate::error::NotSyncedSnafu;
use crate::lifecycle::NodeConfig;
use crate::lifecycle::NodeLifecycle;
use crate::lifecycle::NodeStartOptions;

/// What a role driver produced, for reports and assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReport {
    /// Persistent peers written to the node config, as multiaddrs.
    pub persistent_peers: Vec<String>,
    /// Seed nodes written to the node config, as multiaddrs.
    pub seeds: Vec<String>,
    /// Genesis membership, validators only.
    pub membership: Vec<AccountAddress>,
    /// Accounts funded by the orchestrator.
    pub funded: Vec<AccountAddress>,
    /// Descriptor this instance adopted as its upstream.
    pub upstream: Option<ServiceDescriptor>,
    /// Descriptor this instance announced to its downstream tier.
    pub announced: Option<ServiceDescriptor>,
}

/// Everything a role driver works with.
#[derive(Clone)]
pub struct RoleContext {
    pub config: Arc<RunConfig>,
    pub instance: Instance,
    pub sync: SyncClient,
    pub node: Arc<dyn NodeLifecycle>,
    pub toolkit: Arc<dyn GenesisToolkit>,
    pub editor: Arc<dyn ConfigEditor>,
}

/// Tiers a role outlives, nearest first.
pub fn downstream_tiers(role: Role) -> &'static [Role] {
    match role {
        Role::Light => &[],
        Role::Full => &[Role::Light],
        Role::Bridge => &[Role::Light, Role::Full],
        Role::Seed => &[Role::Light, Role::Full, Role::Bridge],
        Role::Validator | Role::Orchestrator => &[Role::Light, Role::Full, Role::Bridge, Role::Seed],
    }
}

/// Downstream instances a role waits for before stopping its node.
pub fn teardown_target(config: &RunConfig, role: Role) -> u32 {
    downstream_tiers(role)
        .iter()
        .fold(0u32, |total, &tier| total.saturating_add(config.count_of(tier)))
}

/// Run the driver of `ctx.instance`'s role.
pub async fn run_role(ctx: &RoleContext, deadline: &RunDeadline) -> Result<RoleReport, NodeError> {
    match ctx.instance.role {
        Role::Validator | Role::Orchestrator => validator::run(ctx, deadline).await,
        Role::Seed => seed::run(ctx, deadline).await,
        Role::Bridge => bridge::run(ctx, deadline).await,
        Role::Full => full::run(ctx, deadline).await,
        Role::Light => light::run(ctx, deadline).await,
    }
}

impl RoleContext {
    pub fn participant(&self) -> String {
        self.instance.label()
    }

    pub fn address(&self) -> Ipv4Addr {
        assign_address(&self.config.subnet, self.instance.global_seq)
    }

    pub fn home(&self) -> PathBuf {
        self.config.instance_home(&self.instance)
    }

    pub fn node_config_path(&self) -> PathBuf {
        self.home().join("config").join("config.toml")
    }

    pub fn account(&self) -> AccountAddress {
        self.toolkit.identity_account(&self.instance)
    }

    /// Deadline of one stage, capped by the instance deadline.
    pub fn stage_deadline(&self, deadline: &RunDeadline) -> RunDeadline {
        deadline.child(self.config.stage_timeout())
    }

    /// This instance's p2p endpoint.
    pub fn peer_info(&self) -> PeerInfo {
        PeerInfo {
            global_seq: self.instance.global_seq,
            node_id: self.node.identity().node_id,
            address: self.address(),
            port: self.config.p2p_port,
        }
    }

    /// Endpoint downstream tiers connect to.
    pub fn service_multiaddr(&self) -> String {
        format!(
            "/ip4/{}/tcp/{}/p2p/{}",
            self.address(),
            self.config.service_port,
            self.node.identity().node_id
        )
    }

    pub fn announce_params(&self, group_size: u32) -> AnnounceParams {
        AnnounceParams {
            id: self.instance.group_seq,
            multiaddr: self.service_multiaddr(),
            group_size,
            initial_height: self.config.initial_height,
            settle_delay: self.config.settle_delay(),
            height_poll_interval: self.config.poll_interval(),
        }
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            chain_id: self.config.chain_id.clone(),
            listen_address: self.peer_info().multiaddr(),
            ..NodeConfig::default()
        }
    }

    pub fn start_options(&self, config: NodeConfig, upstream: Option<&ServiceDescriptor>) -> NodeStartOptions {
        NodeStartOptions {
            home: self.home(),
            role: self.instance.role,
            config,
            trusted_checkpoint: upstream.map(|descriptor| descriptor.trusted_checkpoint),
            upstream: upstream.map(|descriptor| descriptor.multiaddr.clone()),
        }
    }

    pub fn set_param(&self, section: &str, key: &str, value: impl Into<Value>) -> Result<(), NodeError> {
        self.editor.change_param(&self.node_config_path(), section, key, value.into())?;
        Ok(())
    }

    /// Persist the settings every role shares.
    pub fn write_node_config(&self, config: &NodeConfig) -> Result<(), NodeError> {
        self.set_param("", "moniker", self.participant())?;
        self.set_param("", "chain_id", config.chain_id.as_str())?;
        self.set_param("p2p", "laddr", config.listen_address.as_str())?;
        self.set_param("p2p", "persistent_peers", config.persistent_peers.join(","))?;
        self.set_param("p2p", "seeds", config.seeds.join(","))?;
        Ok(())
    }

    /// Persist the upstream endpoint and trusted checkpoint of a downstream node.
    pub fn write_upstream_config(&self, upstream: &ServiceDescriptor) -> Result<(), NodeError> {
        let checkpoint = &upstream.trusted_checkpoint;
        self.set_param("upstream", "multiaddr", upstream.multiaddr.as_str())?;
        self.set_param("header", "trusted_hash", checkpoint.hash.to_hex())?;
        self.set_param("header", "trusted_height", i64::try_from(checkpoint.height).unwrap_or(i64::MAX))?;
        Ok(())
    }

    /// Poll until the node stops reporting syncing.
    pub async fn await_synced(&self, deadline: &RunDeadline) -> Result<(), NodeError> {
        loop {
            match self.node.is_syncing().await {
                Ok(false) => return Ok(()),
                Ok(true) => debug!(instance = %self.instance, "node still syncing"),
                Err(err) => debug!(instance = %self.instance, error = %err, "sync status query failed, retrying"),
            }
            deadline
                .sleep("node to finish syncing", self.config.poll_interval())
                .await
                .context(NotSyncedSnafu)?;
        }
    }

    /// Wait until every instance downstream of this role is done.
    ///
    /// Each tier is waited on through its own finished state. Failed
    /// instances count as done, so the node stays up for live downstream
    /// peers but not for ones that will never signal.
    pub async fn await_teardown(&self, deadline: &RunDeadline) -> Result<(), NodeError> {
        for &tier in downstream_tiers(self.instance.role) {
            let expected = self.config.count_of(tier);
            if expected == 0 {
                continue;
            }
            let settled = self.sync.settled(&finished_state(tier), expected, deadline).await?;
            for failure in &settled.failures {
                warn!(
                    instance = %self.instance,
                    participant = %failure.participant,
                    reason = %failure.reason,
                    "downstream instance failed"
                );
            }
            debug!(instance = %self.instance, tier = %tier, finished = settled.count, expected, "downstream tier done");
        }
        Ok(())
    }

    pub async fn stop_node(&self) -> Result<(), NodeError> {
        self.node.stop().await.context(LifecycleSnafu { operation: "stop" })?;
        info!(instance = %self.instance, "node stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_runs_downstream_first() {
        let config = RunConfig {
            validators: 4,
            seeds: 2,
            bridges: 3,
            full_nodes: 5,
            light_nodes: 7,
            ..RunConfig::default()
        };
        assert_eq!(teardown_target(&config, Role::Light), 0);
        assert_eq!(teardown_target(&config, Role::Full), 7);
        assert_eq!(teardown_target(&config, Role::Bridge), 12);
        assert_eq!(teardown_target(&config, Role::Seed), 15);
        assert_eq!(teardown_target(&config, Role::Validator), 17);
        assert_eq!(teardown_target(&config, Role::Orchestrator), 17);
    }

    #[test]
    fn test_downstream_tiers_exclude_own_tier() {
        for role in [Role::Validator, Role::Seed, Role::Bridge, Role::Full, Role::Light] {
            assert!(!downstream_tiers(role).contains(&role));
        }
        assert_eq!(downstream_tiers(Role::Orchestrator), downstream_tiers(Role::Validator));
    }
}
