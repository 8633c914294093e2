//! Scoped milestone helper.

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

use crate::client::SyncClient;

impl SyncClient {
    /// Run `stage` and report its outcome on `state`.
    ///
    /// On success signals entry; on error records a failure for
    /// `participant`. Signalling is best effort: a signalling error is
    /// logged and the stage's own result is returned unchanged.
    pub async fn run_stage<T, E, F>(&self, state: &str, participant: &str, stage: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let result = stage.await;
        match &result {
            Ok(_) => {
                if let Err(err) = self.signal_entry(state).await {
                    warn!(state, participant, error = %err, "failed to signal stage success");
                }
            }
            Err(stage_err) => {
                if let Err(err) = self.signal_failure(state, participant, &stage_err.to_string()).await {
                    warn!(state, participant, error = %err, "failed to signal stage failure");
                }
            }
        }
        result
    }
}
