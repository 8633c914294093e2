//! Named monotonic countdown latches.
//!
//! A state is a counter plus a list of explicit failure records, stored as a
//! JSON object in the key-value store and updated with compare-and-swap.
//! Counts only grow: there is no reset and no leave phase. A waiter resumes
//! once the count reaches its target, and every waiter with the same target
//! resumes. Signals past a target are harmless.
//!
//! A participant that cannot reach a milestone records a failure instead of
//! signalling. Waiters whose target is not yet met stop with
//! [`SyncError::PeerFailed`] rather than running into their deadline.

use std::time::Duration;

use rendezvous_core::CAS_RETRY_INITIAL_BACKOFF_MS;
use rendezvous_core::KeyValueStoreError;
use rendezvous_core::MAX_CAS_RETRIES;
use rendezvous_core::ReadRequest;
use rendezvous_core::RunDeadline;
use rendezvous_core::WriteRequest;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::client::SyncClient;
use crate::error::ClosedSnafu;
use crate::error::CorruptedDataSnafu;
use crate::error::MaxRetriesExceededSnafu;
use crate::error::PeerFailedSnafu;
use crate::error::SyncError;
use crate::keys;
use crate::pure::compute_next_backoff_ms;
use crate::pure::compute_next_count;
use crate::pure::is_barrier_satisfied;
use crate::pure::is_settled;
use crate::pure::should_fail_fast;
use crate::topic::validate_name;

/// A participant's explicit failure on a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub participant: String,
    pub reason: String,
}

/// Barrier state stored in the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierState {
    /// State name.
    pub name: String,
    /// Entry signals so far.
    pub count: u32,
    /// Failures, at most one per participant.
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
}

impl BarrierState {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: 0,
            failures: Vec::new(),
        }
    }

    /// Record a failure unless the participant already has one.
    ///
    /// Returns true if the record was added.
    pub fn record_failure(&mut self, participant: &str, reason: &str) -> bool {
        if self.failures.iter().any(|f| f.participant == participant) {
            return false;
        }
        self.failures.push(FailureRecord {
            participant: participant.to_string(),
            reason: reason.to_string(),
        });
        true
    }
}

impl SyncClient {
    /// Signal entry on `state` and return the count after this signal.
    pub async fn signal_entry(&self, state: &str) -> Result<u32, SyncError> {
        validate_name(state)?;
        let updated = self
            .update_state(state, "signal entry", |current| {
                current.count = compute_next_count(current.count);
            })
            .await?;
        debug!(run_id = %self.run_id, state, count = updated.count, "signalled entry");
        Ok(updated.count)
    }

    /// Record that `participant` failed `state`.
    ///
    /// Does not change the count. A participant's second failure is ignored.
    pub async fn signal_failure(&self, state: &str, participant: &str, reason: &str) -> Result<(), SyncError> {
        validate_name(state)?;
        self.update_state(state, "signal failure", |current| {
            current.record_failure(participant, reason);
        })
        .await?;
        warn!(run_id = %self.run_id, state, participant, reason, "signalled failure");
        Ok(())
    }

    /// Wait until `state` has at least `target` entry signals.
    ///
    /// Returns the count observed when the wait ended.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Deadline`] if the deadline trips first
    /// - [`SyncError::PeerFailed`] if a failure is recorded before the
    ///   target is met
    /// - [`SyncError::Closed`] if the client shuts down while waiting
    pub async fn barrier(&self, state: &str, target: u32, deadline: &RunDeadline) -> Result<u32, SyncError> {
        validate_name(state)?;
        let operation = format!("state '{state}' to reach {target}");

        loop {
            let current = self.read_state(state).await?.map(|(s, _)| s).unwrap_or_else(|| BarrierState::empty(state));

            if is_barrier_satisfied(current.count, target) {
                debug!(run_id = %self.run_id, state, target, count = current.count, "barrier satisfied");
                return Ok(current.count);
            }
            if should_fail_fast(current.count, target, current.failures.len())
                && let Some(failure) = current.failures.first()
            {
                return PeerFailedSnafu {
                    state,
                    participant: failure.participant.clone(),
                    reason: failure.reason.clone(),
                }
                .fail();
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return ClosedSnafu { state }.fail(),
                slept = deadline.sleep(operation.clone(), self.config.poll_interval) => slept?,
            }
        }
    }

    /// Wait until `target` participants are done with `state`, whether they
    /// signalled entry or recorded a failure.
    ///
    /// Unlike [`SyncClient::barrier`] a failure never ends the wait early.
    /// Returns the final state so callers can report who failed.
    pub async fn settled(&self, state: &str, target: u32, deadline: &RunDeadline) -> Result<BarrierState, SyncError> {
        validate_name(state)?;
        let operation = format!("state '{state}' to settle at {target}");

        loop {
            let current = self.read_state(state).await?.map(|(s, _)| s).unwrap_or_else(|| BarrierState::empty(state));
            if is_settled(current.count, current.failures.len(), target) {
                debug!(
                    run_id = %self.run_id,
                    state,
                    target,
                    count = current.count,
                    failed = current.failures.len(),
                    "state settled"
                );
                return Ok(current);
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return ClosedSnafu { state }.fail(),
                slept = deadline.sleep(operation.clone(), self.config.poll_interval) => slept?,
            }
        }
    }

    /// Signal entry on `state`, then wait for `target`.
    pub async fn signal_and_wait(&self, state: &str, target: u32, deadline: &RunDeadline) -> Result<u32, SyncError> {
        self.signal_entry(state).await?;
        self.barrier(state, target, deadline).await
    }

    /// Current count of `state`; zero if never signalled.
    pub async fn count(&self, state: &str) -> Result<u32, SyncError> {
        validate_name(state)?;
        Ok(self.read_state(state).await?.map(|(s, _)| s.count).unwrap_or(0))
    }

    /// Failures recorded on `state`.
    pub async fn failures(&self, state: &str) -> Result<Vec<FailureRecord>, SyncError> {
        validate_name(state)?;
        Ok(self.read_state(state).await?.map(|(s, _)| s.failures).unwrap_or_default())
    }

    /// Read a state along with its raw stored form for CAS.
    async fn read_state(&self, state: &str) -> Result<Option<(BarrierState, String)>, SyncError> {
        let key = keys::state_key(&self.run_id, state);
        let raw = match self.store.read(ReadRequest::new(key.clone())).await {
            Ok(result) => result.kv.map(|kv| kv.value),
            Err(KeyValueStoreError::NotFound { .. }) => None,
            Err(err) => return Err(err.into()),
        };
        match raw {
            None => Ok(None),
            Some(raw) => {
                let parsed: BarrierState = serde_json::from_str(&raw).map_err(|err| {
                    CorruptedDataSnafu {
                        key,
                        reason: err.to_string(),
                    }
                    .build()
                })?;
                Ok(Some((parsed, raw)))
            }
        }
    }

    /// Read-modify-CAS loop with capped exponential backoff.
    async fn update_state<F>(&self, state: &str, operation: &str, mut apply: F) -> Result<BarrierState, SyncError>
    where F: FnMut(&mut BarrierState) {
        let key = keys::state_key(&self.run_id, state);
        let mut attempt = 0u32;
        let mut backoff_ms = CAS_RETRY_INITIAL_BACKOFF_MS;

        loop {
            let (expected, mut next) = match self.read_state(state).await? {
                Some((current, raw)) => (Some(raw), current),
                None => (None, BarrierState::empty(state)),
            };
            apply(&mut next);
            let new_value = serde_json::to_string(&next)?;

            match self.store.write(WriteRequest::compare_and_swap(key.clone(), expected, new_value)).await {
                Ok(_) => return Ok(next),
                Err(err) if err.is_cas_conflict() => {
                    attempt += 1;
                    if attempt >= MAX_CAS_RETRIES {
                        return MaxRetriesExceededSnafu {
                            operation: format!("{operation} on state '{state}'"),
                            attempts: attempt,
                        }
                        .fail();
                    }
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = compute_next_backoff_ms(backoff_ms);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
