//! Error types for topics and barriers.

use rendezvous_core::DeadlineError;
use rendezvous_core::KeyValueStoreError;
use snafu::Snafu;

/// Errors from the topic bus and barrier primitives.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SyncError {
    /// A wait lost the race against its run deadline.
    #[snafu(display("{source}"))]
    Deadline { source: DeadlineError },

    /// The bus was shut down before a value arrived.
    #[snafu(display("subscription to topic '{topic}' closed"))]
    SubscriptionClosed { topic: String },

    /// The sync client was shut down while a barrier wait was pending.
    #[snafu(display("sync client closed while waiting on state '{state}'"))]
    Closed { state: String },

    /// Another participant recorded an explicit failure on a state.
    #[snafu(display("participant '{participant}' failed state '{state}': {reason}"))]
    PeerFailed {
        state: String,
        participant: String,
        reason: String,
    },

    /// A collection ended before enough distinct values arrived.
    #[snafu(display("topic '{topic}' delivered {received} of {expected} distinct values: {reason}"))]
    Incomplete {
        topic: String,
        expected: u32,
        received: u32,
        reason: String,
    },

    /// Topic or state name does not satisfy the naming rules.
    #[snafu(display("invalid name '{name}': {reason}"))]
    InvalidName { name: String, reason: String },

    /// Maximum CAS retries exceeded.
    #[snafu(display("max retries exceeded for {operation}: {attempts} attempts"))]
    MaxRetriesExceeded { operation: String, attempts: u32 },

    /// Data in storage is corrupted or unparseable.
    #[snafu(display("corrupted data in key '{key}': {reason}"))]
    CorruptedData { key: String, reason: String },

    /// Underlying storage error.
    #[snafu(display("storage error: {source}"))]
    Storage { source: KeyValueStoreError },

    /// JSON serialization/deserialization error.
    #[snafu(display("serialization error: {source}"))]
    Serialization { source: serde_json::Error },
}

impl SyncError {
    /// True if the error came from a tripped or cancelled deadline.
    pub fn is_deadline(&self) -> bool {
        matches!(self, SyncError::Deadline { .. })
    }
}

impl From<KeyValueStoreError> for SyncError {
    fn from(source: KeyValueStoreError) -> Self {
        SyncError::Storage { source }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(source: serde_json::Error) -> Self {
        SyncError::Serialization { source }
    }
}

impl From<DeadlineError> for SyncError {
    fn from(source: DeadlineError) -> Self {
        SyncError::Deadline { source }
    }
}
