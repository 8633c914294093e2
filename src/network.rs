//! In-process network of simulated nodes.
//!
//! [`LocalNetwork`] plays the harness: it assigns every instance its two
//! sequence numbers, starts the runners in a seeded shuffled order with a
//! little jitter, and gathers their outcomes into a [`RunReport`]. All
//! instances share one [`KeyValueStore`] and nothing else.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rendezvous_bootstrap::DeterministicGenesisToolkit;
use rendezvous_bootstrap::GenesisToolkit;
use rendezvous_core::DeterministicKeyValueStore;
use rendezvous_core::KeyValueStore;
use rendezvous_core::RunDeadline;
use rendezvous_network::Instance;
use rendezvous_network::Role;
use rendezvous_node::ConfigEditor;
use rendezvous_node::InstanceOutcome;
use rendezvous_node::InstanceRunner;
use rendezvous_node::RecordingConfigEditor;
use rendezvous_node::RoleContext;
use rendezvous_node::RunConfig;
use rendezvous_node::SimulatedNode;
use rendezvous_node::SimulatedNodeOptions;
use rendezvous_node::TomlConfigEditor;
use rendezvous_sync::SyncClient;
use rendezvous_sync::SyncConfig;
use serde::Deserialize;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Adjusts the simulated node of one instance before it is created.
pub type NodeOptionsHook = Arc<dyn Fn(&Instance, &mut SimulatedNodeOptions) + Send + Sync>;

/// Runs every instance of a [`RunConfig`] against one shared store.
pub struct LocalNetwork {
    config: Arc<RunConfig>,
    store: Arc<dyn KeyValueStore>,
    editor: Arc<dyn ConfigEditor>,
    node_hook: Option<NodeOptionsHook>,
}

impl LocalNetwork {
    /// Network backed by a fresh in-memory store.
    ///
    /// Node configs are written as TOML under `home_dir` when one is set
    /// and only recorded in memory otherwise.
    pub fn new(config: RunConfig) -> Self {
        let editor: Arc<dyn ConfigEditor> = if config.home_dir.is_some() {
            Arc::new(TomlConfigEditor)
        } else {
            Arc::new(RecordingConfigEditor::new())
        };
        Self {
            config: Arc::new(config),
            store: DeterministicKeyValueStore::new(),
            editor,
            node_hook: None,
        }
    }

    /// Use an existing store, e.g. one shared with another run.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_editor(mut self, editor: Arc<dyn ConfigEditor>) -> Self {
        self.editor = editor;
        self
    }

    /// Customize simulated nodes, e.g. to inject stalls or start failures.
    pub fn with_node_options(
        mut self,
        hook: impl Fn(&Instance, &mut SimulatedNodeOptions) + Send + Sync + 'static,
    ) -> Self {
        self.node_hook = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every instance to completion.
    ///
    /// Keys left in the store by an earlier run with the same run id are
    /// purged first. Fails only when the configuration is invalid, the purge
    /// fails, or a runner task panics. Instance failures are part of the
    /// report.
    pub async fn run(&self) -> Result<RunReport> {
        self.config.validate().context("invalid run configuration")?;
        let removed = self.sync_client()?.purge().await.context("failed to purge run namespace")?;
        if removed > 0 {
            info!(run_id = %self.config.run_id, removed, "cleared keys of an earlier run");
        }
        let started = Instant::now();
        let deadline = RunDeadline::after(self.config.timeout());

        let mut order = self.config.instances();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        order.shuffle(&mut rng);
        info!(
            run_id = %self.config.run_id,
            instances = order.len(),
            validators = self.config.validators,
            seeds = self.config.seeds,
            bridges = self.config.bridges,
            full_nodes = self.config.full_nodes,
            light_nodes = self.config.light_nodes,
            "starting local network"
        );

        let mut tasks = JoinSet::new();
        for instance in order {
            let jitter = Duration::from_millis(rng.gen_range(0..=self.config.start_jitter_ms));
            let runner = InstanceRunner::new(self.context(instance)?);
            let deadline = deadline.clone();
            tasks.spawn(async move {
                if !jitter.is_zero() && deadline.sleep("start jitter", jitter).await.is_err() {
                    debug!(instance = %instance, "deadline reached during start jitter");
                }
                runner.run(&deadline).await
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined.context("instance runner panicked")?);
        }
        outcomes.sort_by_key(|outcome| outcome.instance.global_seq);

        let report = RunReport {
            run_id: self.config.run_id.clone(),
            elapsed: started.elapsed(),
            outcomes,
        };
        if report.has_fatal_failure() {
            warn!(run_id = %report.run_id, failed = report.failures().count(), "run finished with fatal failures");
        } else {
            info!(run_id = %report.run_id, elapsed_ms = report.elapsed.as_millis() as u64, "run finished");
        }
        Ok(report)
    }

    fn sync_client(&self) -> Result<SyncClient> {
        SyncClient::with_config(
            self.store.clone(),
            self.config.run_id.clone(),
            SyncConfig::with_poll_interval_ms(self.config.poll_interval_ms),
        )
        .context("failed to create coordination client")
    }

    fn context(&self, instance: Instance) -> Result<RoleContext> {
        let sync = self.sync_client()?;

        let mut options =
            SimulatedNodeOptions::new(self.config.run_id.clone(), instance.global_seq, self.config.block_time());
        if let Some(hook) = &self.node_hook {
            hook(&instance, &mut options);
        }
        let toolkit: Arc<dyn GenesisToolkit> = Arc::new(DeterministicGenesisToolkit::new(self.config.run_id.clone()));

        Ok(RoleContext {
            config: self.config.clone(),
            instance,
            sync,
            node: Arc::new(SimulatedNode::new(options)),
            toolkit,
            editor: self.editor.clone(),
        })
    }
}

/// Outcomes of every instance of one run, ordered by global sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub elapsed: Duration,
    pub outcomes: Vec<InstanceOutcome>,
}

impl RunReport {
    pub fn has_fatal_failure(&self) -> bool {
        self.outcomes.iter().any(InstanceOutcome::is_fatal)
    }

    pub fn failures(&self) -> impl Iterator<Item = &InstanceOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_success()).count()
    }

    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &InstanceOutcome> {
        self.outcomes.iter().filter(move |outcome| outcome.instance.role == role)
    }

    /// Outcome of the instance labelled `label` (e.g. `bridge-1`).
    pub fn outcome(&self, label: &str) -> Option<&InstanceOutcome> {
        self.outcomes.iter().find(|outcome| outcome.instance.label() == label)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "run {}: {}/{} instances ok in {:.2}s",
            self.run_id,
            self.succeeded(),
            self.outcomes.len(),
            self.elapsed.as_secs_f64()
        )?;
        for outcome in &self.outcomes {
            writeln!(f, "  {outcome}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> RunConfig {
        RunConfig {
            run_id: "harness".into(),
            validators: 1,
            bridges: 1,
            full_nodes: 0,
            light_nodes: 0,
            poll_interval_ms: 2,
            block_time_ms: 2,
            initial_height: 2,
            settle_delay_ms: 0,
            start_jitter_ms: 5,
            timeout_secs: 10,
            stage_timeout_secs: 10,
            ..RunConfig::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_up_front() {
        let config = RunConfig {
            validators: 0,
            ..quick_config()
        };
        let err = LocalNetwork::new(config).run().await.unwrap_err();
        assert!(err.to_string().contains("invalid run configuration"));
    }

    #[tokio::test]
    async fn test_report_is_ordered_by_global_seq() {
        let report = LocalNetwork::new(quick_config()).run().await.unwrap();

        let seqs: Vec<u32> = report.outcomes.iter().map(|outcome| outcome.instance.global_seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(report.succeeded(), 2);
        assert!(!report.has_fatal_failure());
        assert!(report.outcome("bridge-1").is_some());
    }

    #[tokio::test]
    async fn test_display_lists_every_instance() {
        let report = LocalNetwork::new(quick_config()).run().await.unwrap();
        let rendered = report.to_string();

        assert!(rendered.starts_with("run harness: 2/2 instances ok"));
        assert!(rendered.contains("validator-1"));
        assert!(rendered.contains("bridge-1"));
    }
}
