//! Node error types and the failure taxonomy of a run.

use std::fmt;
use std::path::PathBuf;

use rendezvous_bootstrap::BootstrapError;
use rendezvous_core::BoxError;
use rendezvous_core::DeadlineError;
use rendezvous_sync::SyncError;
use rendezvous_topology::TopologyError;
use serde::Deserialize;
use serde::Serialize;
use snafu::Snafu;

use crate::config::ConfigError;

/// How a failed instance affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Invalid configuration, detected before any coordination.
    Configuration,
    /// Genesis could not gather full membership; the run is broken.
    BootstrapQuorum,
    /// No upstream descriptor matched; fatal for this instance only.
    UpstreamUnavailable,
    /// A node never proved liveness. Recorded, does not abort the run.
    Liveness,
    /// The node driver failed to start or stop.
    Lifecycle,
    /// Storage, serialization, deadline or peer failure outside a quorum phase.
    Coordination,
}

impl FailureKind {
    /// True unless the failure is only recorded.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FailureKind::Liveness)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::BootstrapQuorum => "bootstrap-quorum",
            FailureKind::UpstreamUnavailable => "upstream-unavailable",
            FailureKind::Liveness => "liveness",
            FailureKind::Lifecycle => "lifecycle",
            FailureKind::Coordination => "coordination",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors editing a node's persisted configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigEditError {
    #[snafu(display("failed to read node config {}: {source}", path.display()))]
    ReadConfig { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to parse node config {}: {source}", path.display()))]
    ParseConfig { path: PathBuf, source: toml::de::Error },

    #[snafu(display("section '{section}' of {} is not a table", path.display()))]
    NotATable { path: PathBuf, section: String },

    #[snafu(display("failed to render node config {}: {source}", path.display()))]
    RenderConfig { path: PathBuf, source: toml::ser::Error },

    #[snafu(display("failed to write node config {}: {source}", path.display()))]
    WriteConfig { path: PathBuf, source: std::io::Error },
}

/// Errors of one instance's role driver.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NodeError {
    #[snafu(display("{source}"))]
    Config { source: ConfigError },

    #[snafu(display("failed to edit node config: {source}"))]
    ConfigEdit { source: ConfigEditError },

    #[snafu(display("bootstrap failed: {source}"))]
    Bootstrap { source: BootstrapError },

    #[snafu(display("topology failed: {source}"))]
    Topology { source: TopologyError },

    #[snafu(display("coordination failed: {source}"))]
    Sync { source: SyncError },

    #[snafu(display("node failed to {operation}: {source}"))]
    Lifecycle { operation: String, source: BoxError },

    /// The node kept reporting syncing until the deadline.
    #[snafu(display("node never finished syncing: {source}"))]
    NotSynced { source: DeadlineError },

    #[snafu(display("node task ended without starting: {reason}"))]
    TaskAborted { reason: String },

    #[snafu(display("{source}"))]
    Deadline { source: DeadlineError },
}

impl NodeError {
    /// Where this error sits in the failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            NodeError::Config { .. } | NodeError::ConfigEdit { .. } => FailureKind::Configuration,
            NodeError::Bootstrap { source } => match source {
                err if err.is_quorum_failure() => FailureKind::BootstrapQuorum,
                BootstrapError::FundingFailed { .. } => FailureKind::Lifecycle,
                _ => FailureKind::Coordination,
            },
            NodeError::Topology { source } => match source {
                TopologyError::UpstreamUnavailable { .. } => FailureKind::UpstreamUnavailable,
                TopologyError::Liveness { .. } => FailureKind::Liveness,
                TopologyError::Node { .. } => FailureKind::Lifecycle,
                TopologyError::Sync { .. } => FailureKind::Coordination,
            },
            NodeError::NotSynced { .. } => FailureKind::Liveness,
            NodeError::Lifecycle { .. } | NodeError::TaskAborted { .. } => FailureKind::Lifecycle,
            NodeError::Sync { .. } | NodeError::Deadline { .. } => FailureKind::Coordination,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

impl From<ConfigError> for NodeError {
    fn from(source: ConfigError) -> Self {
        NodeError::Config { source }
    }
}

impl From<ConfigEditError> for NodeError {
    fn from(source: ConfigEditError) -> Self {
        NodeError::ConfigEdit { source }
    }
}

impl From<BootstrapError> for NodeError {
    fn from(source: BootstrapError) -> Self {
        NodeError::Bootstrap { source }
    }
}

impl From<TopologyError> for NodeError {
    fn from(source: TopologyError) -> Self {
        NodeError::Topology { source }
    }
}

impl From<SyncError> for NodeError {
    fn from(source: SyncError) -> Self {
        NodeError::Sync { source }
    }
}

impl From<DeadlineError> for NodeError {
    fn from(source: DeadlineError) -> Self {
        NodeError::Deadline { source }
    }
}
