//! Bridges: adopt a validator as core endpoint, get funded, announce to
//! full and light nodes.

use rendezvous_bootstrap::request_funding;
use rendezvous_core::RunDeadline;
use rendezvous_network::FundingRequest;
use rendezvous_network::protocol::ACCOUNTS_FUNDED;
use rendezvous_network::protocol::BRIDGE_DESCRIPTORS;
use rendezvous_network::protocol::VALIDATOR_DESCRIPTORS;
use rendezvous_topology::announce_service;
use rendezvous_topology::resolve_upstream;

use super::RoleContext;
use super::RoleReport;
use crate::error::NodeError;
use crate::task::NodeTask;

pub(super) async fn run(ctx: &RoleContext, deadline: &RunDeadline) -> Result<RoleReport, NodeError> {
    let config = &ctx.config;
    let mut report = RoleReport::default();

    request_funding(&ctx.sync, &FundingRequest {
        global_seq: ctx.instance.global_seq,
        role: ctx.instance.role,
        account: ctx.account(),
    })
    .await?;

    let upstream = resolve_upstream(
        &ctx.sync,
        &VALIDATOR_DESCRIPTORS,
        ctx.instance.group_seq,
        &ctx.stage_deadline(deadline),
    )
    .await?;
    ctx.sync.barrier(ACCOUNTS_FUNDED, 1, &ctx.stage_deadline(deadline)).await?;

    let node_config = ctx.node_config();
    ctx.write_node_config(&node_config)?;
    ctx.write_upstream_config(&upstream)?;

    let stage = ctx.stage_deadline(deadline);
    let mut task = NodeTask::spawn(ctx.node.clone(), ctx.start_options(node_config, Some(&upstream)), deadline);
    let params = ctx.announce_params(config.bridges);
    let (_, announced) = tokio::try_join!(task.started(&stage), async {
        announce_service(&ctx.sync, ctx.node.as_ref(), &BRIDGE_DESCRIPTORS, &params, &stage)
            .await
            .map_err(NodeError::from)
    })?;
    report.upstream = Some(upstream);
    report.announced = Some(announced);

    ctx.await_teardown(deadline).await?;
    ctx.stop_node().await?;
    Ok(report)
}
