//! Node side of a rendezvous run.
//!
//! - [`NodeLifecycle`]: the seam to the chain node an instance drives, with
//!   [`SimulatedNode`] for local runs
//! - [`ConfigEditor`]: edits to the node's persisted configuration
//! - [`RunConfig`]: layered run configuration (env, TOML, CLI)
//! - [`roles`]: per-role test-case logic
//! - [`InstanceRunner`]: runs one instance and records an [`InstanceOutcome`]

pub mod config;
pub mod config_editor;
pub mod error;
pub mod lifecycle;
pub mod roles;
pub mod runner;
pub mod simulated;
pub mod task;

pub use config::ConfigError;
pub use config::LightUpstream;
pub use config::RunConfig;
pub use config_editor::ConfigChange;
pub use config_editor::ConfigEditor;
pub use config_editor::RecordingConfigEditor;
pub use config_editor::TomlConfigEditor;
pub use error::ConfigEditError;
pub use error::FailureKind;
pub use error::NodeError;
pub use lifecycle::NodeConfig;
pub use lifecycle::NodeIdentity;
pub use lifecycle::NodeLifecycle;
pub use lifecycle::NodeStartOptions;
pub use roles::RoleContext;
pub use roles::RoleReport;
pub use roles::downstream_tiers;
pub use roles::run_role;
pub use roles::teardown_target;
pub use runner::InstanceFailure;
pub use runner::InstanceOutcome;
pub use runner::InstanceRunner;
pub use simulated::SimulatedNode;
pub use simulated::SimulatedNodeOptions;
pub use task::NodeTask;
