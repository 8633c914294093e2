//! Runs one instance and turns every error into a recorded outcome.

use std::fmt;
use std::time::Duration;

use rendezvous_core::RunDeadline;
use rendezvous_network::Instance;
use rendezvous_network::protocol::FINISHED;
use rendezvous_network::protocol::finished_state;
use serde::Deserialize;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::error::FailureKind;
use crate::error::NodeError;
use crate::roles::RoleContext;
use crate::roles::RoleReport;
use crate::roles::run_role;

/// Why an instance did not complete its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&NodeError> for InstanceFailure {
    fn from(err: &NodeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Final record of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceOutcome {
    pub instance: Instance,
    pub elapsed: Duration,
    pub result: Result<RoleReport, InstanceFailure>,
}

impl InstanceOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn failure(&self) -> Option<&InstanceFailure> {
        self.result.as_ref().err()
    }

    pub fn is_fatal(&self) -> bool {
        self.failure().is_some_and(|failure| failure.kind.is_fatal())
    }

    pub fn report(&self) -> Option<&RoleReport> {
        self.result.as_ref().ok()
    }
}

impl fmt::Display for InstanceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.instance.label();
        let seconds = self.elapsed.as_secs_f64();
        match &self.result {
            Ok(_) => write!(f, "{label} ({}) ok in {seconds:.2}s", self.instance.effective_role()),
            Err(failure) => write!(
                f,
                "{label} ({}) FAILED [{}] after {seconds:.2}s: {}",
                self.instance.effective_role(),
                failure.kind,
                failure.message
            ),
        }
    }
}

/// Drives one instance from configuration check to teardown.
pub struct InstanceRunner {
    ctx: RoleContext,
}

impl InstanceRunner {
    pub fn new(ctx: RoleContext) -> Self {
        Self { ctx }
    }

    pub fn instance(&self) -> Instance {
        self.ctx.instance
    }

    /// Run the role under `deadline` capped by the configured instance
    /// timeout.
    ///
    /// Always signals `finished` and the tier's own finished state: an
    /// entry on success or a non-fatal failure, a failure record otherwise,
    /// so waiting peers are never stranded. Signalling is best effort.
    pub async fn run(self, deadline: &RunDeadline) -> InstanceOutcome {
        let started = Instant::now();
        let instance = self.ctx.instance;
        let deadline = deadline.child(self.ctx.config.timeout());
        info!(instance = %instance, address = %self.ctx.address(), "instance starting");

        let result = match self.ctx.config.validate() {
            Ok(()) => run_role(&self.ctx, &deadline).await,
            Err(err) => Err(NodeError::from(err)),
        };

        let result = match result {
            Ok(report) => {
                self.signal_finished().await;
                info!(instance = %instance, "instance finished");
                Ok(report)
            }
            Err(err) => {
                let failure = InstanceFailure::from(&err);
                if failure.kind.is_fatal() {
                    error!(instance = %instance, kind = %failure.kind, error = %err, "instance failed");
                    self.signal_failed(&failure.message).await;
                } else {
                    warn!(instance = %instance, kind = %failure.kind, error = %err, "instance finished with recorded failure");
                    self.signal_finished().await;
                }
                self.stop_after_failure().await;
                Err(failure)
            }
        };

        InstanceOutcome {
            instance,
            elapsed: started.elapsed(),
            result,
        }
    }

    fn finished_states(&self) -> [String; 2] {
        [FINISHED.to_string(), finished_state(self.ctx.instance.role)]
    }

    async fn signal_finished(&self) {
        for state in self.finished_states() {
            if let Err(err) = self.ctx.sync.signal_entry(&state).await {
                warn!(instance = %self.ctx.instance, state = %state, error = %err, "failed to signal finished");
            }
        }
    }

    async fn signal_failed(&self, reason: &str) {
        let participant = self.ctx.participant();
        for state in self.finished_states() {
            if let Err(err) = self.ctx.sync.signal_failure(&state, &participant, reason).await {
                warn!(instance = %self.ctx.instance, state = %state, error = %err, "failed to record failure on finished");
            }
        }
    }

    async fn stop_after_failure(&self) {
        if let Err(err) = self.ctx.node.stop().await {
            debug!(instance = %self.ctx.instance, error = %err, "node stop after failure");
        }
    }
}
