//! The genesis protocol run by every validator.
//!
//! One validator, the orchestrator, collects every identity and builds the
//! genesis bundle. Everyone else waits for the bundle. Then every validator
//! signs and publishes its own join transaction and collects the full set
//! itself, so all validators finalize the same membership without a second
//! round through the orchestrator.

use std::collections::BTreeMap;
use std::sync::Arc;

use rendezvous_core::RunDeadline;
use rendezvous_network::AccountAddress;
use rendezvous_network::GenesisBundle;
use rendezvous_network::Instance;
use rendezvous_network::JoinTransaction;
use rendezvous_network::Subnet;
use rendezvous_network::ValidatorIdentity;
use rendezvous_network::assign_address;
use rendezvous_network::protocol::GENESIS;
use rendezvous_network::protocol::JOIN_TRANSACTIONS;
use rendezvous_network::protocol::VALIDATOR_IDENTITIES;
use rendezvous_sync::SyncClient;
use rendezvous_sync::SyncError;
use snafu::ResultExt;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::BootstrapError;
use crate::error::GenesisNotReceivedSnafu;
use crate::error::InvalidParametersSnafu;
use crate::error::NotInGenesisSnafu;
use crate::error::QuorumNotReachedSnafu;
use crate::phase::BootstrapPhase;
use crate::phase::PhaseTracker;
use crate::toolkit::GenesisToolkit;

/// Inputs to the genesis protocol shared by every validator of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisParams {
    pub chain_id: String,
    /// Size of the validator group; genesis needs all of them.
    pub validators: u32,
    /// Initial stake of every genesis account.
    pub stake: u64,
}

/// Genesis as finalized by one validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedGenesis {
    pub bundle: GenesisBundle,
    /// One per genesis account, sorted by signer.
    pub join_transactions: Vec<JoinTransaction>,
    /// Signers of `join_transactions`, in the same order.
    pub membership: Vec<AccountAddress>,
    pub final_genesis_bytes: Vec<u8>,
}

/// Drives one validator through the genesis protocol.
pub struct GenesisCoordinator {
    sync: SyncClient,
    toolkit: Arc<dyn GenesisToolkit>,
    instance: Instance,
    subnet: Subnet,
    params: GenesisParams,
    phase: PhaseTracker,
}

impl GenesisCoordinator {
    pub fn new(
        sync: SyncClient,
        toolkit: Arc<dyn GenesisToolkit>,
        instance: Instance,
        subnet: Subnet,
        params: GenesisParams,
    ) -> Self {
        let phase = PhaseTracker::new(instance.is_orchestrator());
        Self {
            sync,
            toolkit,
            instance,
            subnet,
            params,
            phase,
        }
    }

    /// Observe phase changes.
    pub fn phases(&self) -> watch::Receiver<BootstrapPhase> {
        self.phase.subscribe()
    }

    /// Account this validator joins genesis with.
    pub fn account(&self) -> AccountAddress {
        self.toolkit.identity_account(&self.instance)
    }

    /// Run the protocol to completion.
    ///
    /// Any error leaves the phase at [`BootstrapPhase::Failed`].
    pub async fn run(&self, deadline: &RunDeadline) -> Result<FinalizedGenesis, BootstrapError> {
        let result = self.run_phases(deadline).await;
        if let Err(err) = &result {
            warn!(instance = %self.instance, phase = %self.phase.current(), error = %err, "genesis protocol failed");
            self.phase.fail();
        }
        result
    }

    async fn run_phases(&self, deadline: &RunDeadline) -> Result<FinalizedGenesis, BootstrapError> {
        if self.params.validators == 0 {
            return InvalidParametersSnafu {
                reason: "validator group is empty",
            }
            .fail();
        }

        self.phase.advance(BootstrapPhase::PublishingIdentity)?;
        let account = self.account();
        let identity = ValidatorIdentity {
            global_seq: self.instance.global_seq,
            group_seq: self.instance.group_seq,
            account: account.clone(),
            address: assign_address(&self.subnet, self.instance.global_seq),
        };
        self.sync.publish(&VALIDATOR_IDENTITIES, &identity).await?;
        debug!(instance = %self.instance, account = %account, "published identity");

        let bundle = if self.instance.is_orchestrator() {
            self.build_and_broadcast(deadline).await?
        } else {
            self.await_genesis(deadline).await?
        };

        if !bundle.has_account(&account) {
            return NotInGenesisSnafu { account }.fail();
        }

        self.phase.advance(BootstrapPhase::SigningJoinTx)?;
        let join_tx = self.toolkit.sign_join_transaction(&account, &bundle)?;

        self.phase.advance(BootstrapPhase::BroadcastingJoinTx)?;
        self.sync.publish(&JOIN_TRANSACTIONS, &join_tx).await?;

        self.phase.advance(BootstrapPhase::CollectingJoinTxs)?;
        let join_transactions = self.collect_join_transactions(&bundle, deadline).await?;

        self.phase.advance(BootstrapPhase::Finalizing)?;
        let final_genesis_bytes = self.toolkit.finalize(&bundle, &join_transactions)?;
        let membership = join_transactions.iter().map(|tx| tx.signer.clone()).collect();

        self.phase.advance(BootstrapPhase::Ready)?;
        info!(
            instance = %self.instance,
            chain_id = %bundle.chain_id,
            validators = join_transactions.len(),
            "genesis finalized"
        );

        Ok(FinalizedGenesis {
            bundle,
            join_transactions,
            membership,
            final_genesis_bytes,
        })
    }

    async fn build_and_broadcast(&self, deadline: &RunDeadline) -> Result<GenesisBundle, BootstrapError> {
        self.phase.advance(BootstrapPhase::CollectingIdentities)?;
        let mut identities = self
            .sync
            .subscribe(&VALIDATOR_IDENTITIES)?
            .collect_distinct(self.params.validators, |identity| identity.global_seq, deadline)
            .await
            .map_err(|err| BootstrapError::from_collection("collecting validator identities", err))?;
        identities.sort_by_key(|identity| identity.global_seq);
        info!(count = identities.len(), "collected validator identities");

        self.phase.advance(BootstrapPhase::BuildingGenesis)?;
        let bundle = self.toolkit.build_genesis(&self.params.chain_id, &identities, self.params.stake)?;

        self.phase.advance(BootstrapPhase::BroadcastingGenesis)?;
        let seq = self.sync.publish(&GENESIS, &bundle).await?;
        info!(seq, accounts = bundle.validator_accounts.len(), "broadcast genesis");
        Ok(bundle)
    }

    async fn await_genesis(&self, deadline: &RunDeadline) -> Result<GenesisBundle, BootstrapError> {
        self.phase.advance(BootstrapPhase::AwaitingGenesis)?;
        let mut subscription = self.sync.subscribe(&GENESIS)?;
        let bundle = subscription.next(deadline).await.context(GenesisNotReceivedSnafu)?;
        debug!(instance = %self.instance, chain_id = %bundle.chain_id, "received genesis");
        Ok(bundle)
    }

    async fn collect_join_transactions(
        &self,
        bundle: &GenesisBundle,
        deadline: &RunDeadline,
    ) -> Result<Vec<JoinTransaction>, BootstrapError> {
        let expected = bundle.validator_accounts.len();
        let mut collected: BTreeMap<AccountAddress, JoinTransaction> = BTreeMap::new();
        let mut subscription = self.sync.subscribe(&JOIN_TRANSACTIONS)?;

        while collected.len() < expected {
            let tx = match subscription.next(deadline).await {
                Ok(tx) => tx,
                Err(err @ (SyncError::Deadline { .. } | SyncError::SubscriptionClosed { .. })) => {
                    return QuorumNotReachedSnafu {
                        stage: "collecting join transactions",
                        expected: expected as u32,
                        received: collected.len() as u32,
                        reason: err.to_string(),
                    }
                    .fail();
                }
                Err(err) => return Err(err.into()),
            };

            if !bundle.has_account(&tx.signer) {
                warn!(signer = %tx.signer, "ignoring join transaction from signer outside genesis");
                continue;
            }
            if !self.toolkit.verify_join_transaction(&tx, bundle) {
                warn!(signer = %tx.signer, "ignoring join transaction that does not verify");
                continue;
            }
            if collected.contains_key(&tx.signer) {
                debug!(signer = %tx.signer, "dropping duplicate join transaction");
                continue;
            }
            collected.insert(tx.signer.clone(), tx);
        }

        Ok(collected.into_values().collect())
    }
}
