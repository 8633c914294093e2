//! Light nodes: get funded, sync from the configured upstream tier, finish.

use rendezvous_bootstrap::request_funding;
use rendezvous_core::RunDeadline;
use rendezvous_network::FundingRequest;
use rendezvous_network::protocol::ACCOUNTS_FUNDED;
use rendezvous_network::protocol::BRIDGE_DESCRIPTORS;
use rendezvous_network::protocol::FULL_DESCRIPTORS;
use rendezvous_topology::resolve_upstream;
use tracing::info;

use super::RoleContext;
use super::RoleReport;
use crate::config::LightUpstream;
use crate::error::NodeError;
use crate::task::NodeTask;

pub(super) async fn run(ctx: &RoleContext, deadline: &RunDeadline) -> Result<RoleReport, NodeError> {
    request_funding(&ctx.sync, &FundingRequest {
        global_seq: ctx.instance.global_seq,
        role: ctx.instance.role,
        account: ctx.account(),
    })
    .await?;

    let topic = match ctx.config.light_upstream {
        LightUpstream::Bridge => BRIDGE_DESCRIPTORS,
        LightUpstream::Full => FULL_DESCRIPTORS,
    };
    let upstream = resolve_upstream(&ctx.sync, &topic, ctx.instance.group_seq, &ctx.stage_deadline(deadline)).await?;
    ctx.sync.barrier(ACCOUNTS_FUNDED, 1, &ctx.stage_deadline(deadline)).await?;

    let node_config = ctx.node_config();
    ctx.write_node_config(&node_config)?;
    ctx.write_upstream_config(&upstream)?;

    let stage = ctx.stage_deadline(deadline);
    let mut task = NodeTask::spawn(ctx.node.clone(), ctx.start_options(node_config, Some(&upstream)), deadline);
    task.started(&stage).await?;
    ctx.await_synced(&stage).await?;
    info!(instance = %ctx.instance, upstream = upstream.id, "light node synced");

    ctx.stop_node().await?;
    Ok(RoleReport {
        upstream: Some(upstream),
        ..RoleReport::default()
    })
}
