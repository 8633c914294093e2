//! Full nodes: sync from a bridge's checkpoint, then serve light nodes.

use rendezvous_core::RunDeadline;
use rendezvous_network::protocol::BRIDGE_DESCRIPTORS;
use rendezvous_network::protocol::FULL_DESCRIPTORS;
use rendezvous_topology::announce_service;
use rendezvous_topology::resolve_upstream;

use super::RoleContext;
use super::RoleReport;
use crate::error::NodeError;
use crate::task::NodeTask;

pub(super) async fn run(ctx: &RoleContext, deadline: &RunDeadline) -> Result<RoleReport, NodeError> {
    let mut report = RoleReport::default();

    let upstream =
        resolve_upstream(&ctx.sync, &BRIDGE_DESCRIPTORS, ctx.instance.group_seq, &ctx.stage_deadline(deadline))
            .await?;

    let node_config = ctx.node_config();
    ctx.write_node_config(&node_config)?;
    ctx.write_upstream_config(&upstream)?;

    let stage = ctx.stage_deadline(deadline);
    let mut task = NodeTask::spawn(ctx.node.clone(), ctx.start_options(node_config, Some(&upstream)), deadline);
    let params = ctx.announce_params(ctx.config.full_nodes);
    let (_, announced) = tokio::try_join!(task.started(&stage), async {
        announce_service(&ctx.sync, ctx.node.as_ref(), &FULL_DESCRIPTORS, &params, &stage)
            .await
            .map_err(NodeError::from)
    })?;
    report.upstream = Some(upstream);
    report.announced = Some(announced);

    ctx.await_teardown(deadline).await?;
    ctx.stop_node().await?;
    Ok(report)
}
