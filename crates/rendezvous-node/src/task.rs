//! Node start on a background task.

use std::sync::Arc;

use rendezvous_core::RunDeadline;
use snafu::ResultExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::LifecycleSnafu;
use crate::error::NodeError;
use crate::error::TaskAbortedSnafu;
use crate::lifecycle::NodeLifecycle;
use crate::lifecycle::NodeStartOptions;

/// A node start in flight.
///
/// Coordination keeps going while the node boots; [`NodeTask::started`]
/// joins the start when its result matters. Dropping the task cancels a
/// start that has not finished.
pub struct NodeTask {
    handle: Option<JoinHandle<Result<(), NodeError>>>,
    cancel: CancellationToken,
}

impl NodeTask {
    /// Spawn `node.start(options)`. The start is abandoned when `deadline`
    /// is cancelled.
    pub fn spawn(node: Arc<dyn NodeLifecycle>, options: NodeStartOptions, deadline: &RunDeadline) -> Self {
        let cancel = deadline.token().child_token();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let role = options.role;
            tokio::select! {
                biased;
                _ = token.cancelled() => TaskAbortedSnafu { reason: "start cancelled" }.fail(),
                started = node.start(options) => {
                    debug!(role = %role, "node start finished");
                    started.context(LifecycleSnafu { operation: "start" })
                }
            }
        });
        Self {
            handle: Some(handle),
            cancel,
        }
    }

    /// Wait for the start to finish, bounded by `deadline`.
    ///
    /// Returns immediately once joined; later calls report success.
    pub async fn started(&mut self, deadline: &RunDeadline) -> Result<(), NodeError> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        let joined = deadline.race("node start", handle).await?;
        self.handle = None;
        match joined {
            Ok(result) => result,
            Err(err) => TaskAbortedSnafu {
                reason: err.to_string(),
            }
            .fail(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for NodeTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}
