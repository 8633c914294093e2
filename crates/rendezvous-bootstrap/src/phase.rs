//! Per-validator bootstrap state machine.
//!
//! ```text
//! Init -> PublishingIdentity
//!   orchestrator: -> CollectingIdentities -> BuildingGenesis -> BroadcastingGenesis
//!   participant:  -> AwaitingGenesis
//! -> SigningJoinTx -> BroadcastingJoinTx -> CollectingJoinTxs -> Finalizing -> Ready
//! ```
//!
//! Any non-terminal phase may move to `Failed`. `Ready` and `Failed` are
//! terminal.

use std::fmt;

use tokio::sync::watch;
use tracing::debug;

use crate::error::BootstrapError;
use crate::error::InvalidTransitionSnafu;
use crate::pure::is_valid_transition;

/// Where a validator is in the genesis protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapPhase {
    Init,
    PublishingIdentity,
    CollectingIdentities,
    BuildingGenesis,
    BroadcastingGenesis,
    AwaitingGenesis,
    SigningJoinTx,
    BroadcastingJoinTx,
    CollectingJoinTxs,
    Finalizing,
    Ready,
    Failed,
}

impl BootstrapPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapPhase::Init => "init",
            BootstrapPhase::PublishingIdentity => "publishing_identity",
            BootstrapPhase::CollectingIdentities => "collecting_identities",
            BootstrapPhase::BuildingGenesis => "building_genesis",
            BootstrapPhase::BroadcastingGenesis => "broadcasting_genesis",
            BootstrapPhase::AwaitingGenesis => "awaiting_genesis",
            BootstrapPhase::SigningJoinTx => "signing_join_tx",
            BootstrapPhase::BroadcastingJoinTx => "broadcasting_join_tx",
            BootstrapPhase::CollectingJoinTxs => "collecting_join_txs",
            BootstrapPhase::Finalizing => "finalizing",
            BootstrapPhase::Ready => "ready",
            BootstrapPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BootstrapPhase::Ready | BootstrapPhase::Failed)
    }
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes phase changes of one validator to observers.
#[derive(Debug)]
pub struct PhaseTracker {
    is_orchestrator: bool,
    sender: watch::Sender<BootstrapPhase>,
}

impl PhaseTracker {
    pub fn new(is_orchestrator: bool) -> Self {
        let (sender, _) = watch::channel(BootstrapPhase::Init);
        Self { is_orchestrator, sender }
    }

    /// Current phase.
    pub fn current(&self) -> BootstrapPhase {
        *self.sender.borrow()
    }

    /// Receiver that observes every later phase change.
    pub fn subscribe(&self) -> watch::Receiver<BootstrapPhase> {
        self.sender.subscribe()
    }

    /// Move to `next` if the state machine allows it.
    pub fn advance(&self, next: BootstrapPhase) -> Result<(), BootstrapError> {
        let from = self.current();
        if !is_valid_transition(from, next, self.is_orchestrator) {
            return InvalidTransitionSnafu { from, to: next }.fail();
        }
        debug!(from = %from, to = %next, "bootstrap phase");
        self.sender.send_replace(next);
        Ok(())
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&self) {
        self.sender.send_if_modified(|phase| {
            if phase.is_terminal() {
                false
            } else {
                *phase = BootstrapPhase::Failed;
                true
            }
        });
    }
}
