//! Bootstrap error types.

pub use rendezvous_core::BoxError;
use rendezvous_network::AccountAddress;
use rendezvous_sync::SyncError;
use snafu::Snafu;

use crate::phase::BootstrapPhase;

/// Errors from the genesis protocol, peer exchange and funding.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BootstrapError {
    /// Fewer distinct participants than required arrived before the deadline.
    ///
    /// Genesis needs full membership; there is no partial success.
    #[snafu(display("quorum not reached while {stage}: {received} of {expected} ({reason})"))]
    QuorumNotReached {
        stage: String,
        expected: u32,
        received: u32,
        reason: String,
    },

    /// The orchestrator's genesis bundle never arrived.
    #[snafu(display("genesis bundle not received: {source}"))]
    GenesisNotReceived { source: SyncError },

    /// This validator's own account is missing from the genesis bundle.
    #[snafu(display("account {account} is not part of the genesis validator set"))]
    NotInGenesis { account: AccountAddress },

    /// A phase change that the state machine does not allow.
    #[snafu(display("invalid bootstrap transition from {from} to {to}"))]
    InvalidTransition { from: BootstrapPhase, to: BootstrapPhase },

    /// The genesis toolkit rejected its input.
    #[snafu(display("genesis toolkit failed to {operation}: {reason}"))]
    Toolkit { operation: String, reason: String },

    /// Funding an account through the node failed.
    #[snafu(display("failed to fund account {account}: {source}"))]
    FundingFailed { account: AccountAddress, source: BoxError },

    /// Parameters that cannot describe a working network.
    #[snafu(display("invalid bootstrap parameters: {reason}"))]
    InvalidParameters { reason: String },

    /// Topic or barrier failure outside a quorum collection.
    #[snafu(display("coordination error: {source}"))]
    Sync { source: SyncError },
}

impl BootstrapError {
    /// True if the run cannot succeed after this error.
    pub fn is_quorum_failure(&self) -> bool {
        matches!(
            self,
            BootstrapError::QuorumNotReached { .. }
                | BootstrapError::GenesisNotReceived { .. }
                | BootstrapError::NotInGenesis { .. }
        )
    }

    /// Convert a collection error into a quorum failure where it is one.
    pub(crate) fn from_collection(stage: &str, source: SyncError) -> Self {
        match source {
            SyncError::Incomplete {
                expected,
                received,
                reason,
                ..
            } => BootstrapError::QuorumNotReached {
                stage: stage.to_string(),
                expected,
                received,
                reason,
            },
            other => BootstrapError::Sync { source: other },
        }
    }
}

impl From<SyncError> for BootstrapError {
    fn from(source: SyncError) -> Self {
        BootstrapError::Sync { source }
    }
}
