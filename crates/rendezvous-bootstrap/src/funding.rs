//! Post-genesis account funding served by the orchestrator.
//!
//! Instances that need a funded account (bridges and light nodes pay for
//! blob submissions) publish a [`FundingRequest`]. The orchestrator collects
//! the expected number of distinct requests, funds each account through its
//! node, and the role driver then signals `accounts-funded`.

use async_trait::async_trait;
use rendezvous_core::RunDeadline;
use rendezvous_network::AccountAddress;
use rendezvous_network::FundingRequest;
use rendezvous_network::protocol::FUNDING_REQUESTS;
use rendezvous_sync::SyncClient;
use snafu::ResultExt;
use tracing::info;

use crate::error::BootstrapError;
use crate::error::BoxError;
use crate::error::FundingFailedSnafu;

/// Something that can move funds to an account, usually a running node.
#[async_trait]
pub trait AccountFunder: Send + Sync {
    async fn fund_account(&self, account: &AccountAddress, amount: u64) -> Result<(), BoxError>;
}

/// Ask the orchestrator to fund `request.account`.
pub async fn request_funding(sync: &SyncClient, request: &FundingRequest) -> Result<u64, BootstrapError> {
    let seq = sync.publish(&FUNDING_REQUESTS, request).await?;
    info!(global_seq = request.global_seq, account = %request.account, seq, "requested funding");
    Ok(seq)
}

/// Collect `expected` distinct requests and fund each account with `amount`.
///
/// Requests are deduplicated by global sequence number. Returns the served
/// requests in arrival order.
pub async fn serve_funding(
    sync: &SyncClient,
    funder: &dyn AccountFunder,
    expected: u32,
    amount: u64,
    deadline: &RunDeadline,
) -> Result<Vec<FundingRequest>, BootstrapError> {
    if expected == 0 {
        return Ok(Vec::new());
    }

    let requests = sync
        .subscribe(&FUNDING_REQUESTS)?
        .collect_distinct(expected, |request| request.global_seq, deadline)
        .await
        .map_err(|err| BootstrapError::from_collection("collecting funding requests", err))?;

    for request in &requests {
        funder.fund_account(&request.account, amount).await.context(FundingFailedSnafu {
            account: request.account.clone(),
        })?;
        info!(global_seq = request.global_seq, role = %request.role, account = %request.account, amount, "funded account");
    }

    Ok(requests)
}
