//! Seed nodes: wait for genesis, publish the seed endpoint, run until every
//! downstream tier is done.

use rendezvous_core::RunDeadline;
use rendezvous_network::protocol::GENESIS;
use rendezvous_network::protocol::GENESIS_READY;
use rendezvous_network::protocol::NETWORK_CONFIGURED;
use rendezvous_network::protocol::SEED_PEERS;
use tracing::info;

use super::RoleContext;
use super::RoleReport;
use crate::error::NodeError;
use crate::task::NodeTask;

pub(super) async fn run(ctx: &RoleContext, deadline: &RunDeadline) -> Result<RoleReport, NodeError> {
    let config = &ctx.config;
    let participant = ctx.participant();

    ctx.sync.barrier(GENESIS_READY, config.validators, &ctx.stage_deadline(deadline)).await?;
    let bundle = ctx.sync.subscribe(&GENESIS)?.next(&ctx.stage_deadline(deadline)).await?;

    let own = ctx.peer_info();
    let seq = ctx.sync.publish(&SEED_PEERS, &own).await?;
    info!(instance = %ctx.instance, seq, multiaddr = %own.multiaddr(), "published seed endpoint");

    let mut node_config = ctx.node_config();
    node_config.chain_id = bundle.chain_id;
    ctx.sync
        .run_stage(NETWORK_CONFIGURED, &participant, async {
            ctx.write_node_config(&node_config)?;
            ctx.set_param("p2p", "seed_mode", true)
        })
        .await?;
    let configured = config.validators.saturating_add(config.seeds);
    ctx.sync.barrier(NETWORK_CONFIGURED, configured, &ctx.stage_deadline(deadline)).await?;

    let mut task = NodeTask::spawn(ctx.node.clone(), ctx.start_options(node_config, None), deadline);
    task.started(&ctx.stage_deadline(deadline)).await?;

    ctx.await_teardown(deadline).await?;
    ctx.stop_node().await?;
    Ok(RoleReport::default())
}
