//! Topology error types.

use rendezvous_core::BoxError;
use rendezvous_core::DeadlineError;
use rendezvous_sync::SyncError;
use snafu::Snafu;

/// Errors from announcing or resolving service descriptors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TopologyError {
    /// No matching descriptor arrived before the topic closed or the
    /// deadline tripped. Fatal for the consumer only.
    #[snafu(display("no upstream on '{topic}' for consumer {consumer}: {reason}"))]
    UpstreamUnavailable {
        topic: String,
        consumer: u32,
        reason: String,
    },

    /// The node never reached the height it must serve before announcing.
    #[snafu(display("node stuck at height {reached}, expected {height}: {source}"))]
    Liveness {
        height: u64,
        reached: u64,
        source: DeadlineError,
    },

    /// The node failed a query the announcement depends on.
    #[snafu(display("node failed to {operation}: {source}"))]
    Node { operation: String, source: BoxError },

    /// Topic failure outside the upstream wait.
    #[snafu(display("coordination error: {source}"))]
    Sync { source: SyncError },
}

impl From<SyncError> for TopologyError {
    fn from(source: SyncError) -> Self {
        TopologyError::Sync { source }
    }
}
