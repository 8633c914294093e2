//! Validators: genesis, persistent peers, node start, descriptor
//! announcement. The orchestrator additionally serves funding.

use rendezvous_bootstrap::AccountFunder;
use rendezvous_bootstrap::GenesisCoordinator;
use rendezvous_bootstrap::GenesisParams;
use rendezvous_bootstrap::PeerExchangeParams;
use rendezvous_bootstrap::exchange_peers;
use rendezvous_bootstrap::serve_funding;
use rendezvous_core::RunDeadline;
use rendezvous_network::PeerInfo;
use rendezvous_network::protocol::ACCOUNTS_FUNDED;
use rendezvous_network::protocol::GENESIS_READY;
use rendezvous_network::protocol::NETWORK_CONFIGURED;
use rendezvous_network::protocol::SEED_PEERS;
use rendezvous_network::protocol::VALIDATOR_DESCRIPTORS;
use rendezvous_topology::announce_service;
use tracing::info;

use super::RoleContext;
use super::RoleReport;
use crate::error::NodeError;
use crate::lifecycle::NodeConfig;
use crate::task::NodeTask;

pub(super) async fn run(ctx: &RoleContext, deadline: &RunDeadline) -> Result<RoleReport, NodeError> {
    let config = &ctx.config;
    let participant = ctx.participant();
    let mut report = RoleReport::default();

    let coordinator = GenesisCoordinator::new(
        ctx.sync.clone(),
        ctx.toolkit.clone(),
        ctx.instance,
        config.subnet,
        GenesisParams {
            chain_id: config.chain_id.clone(),
            validators: config.validators,
            stake: config.validator_stake,
        },
    );
    let stage = ctx.stage_deadline(deadline);
    let genesis = ctx.sync.run_stage(GENESIS_READY, &participant, coordinator.run(&stage)).await?;
    report.membership = genesis.membership.clone();

    let peers = exchange_peers(
        &ctx.sync,
        &ctx.instance,
        &ctx.peer_info(),
        PeerExchangeParams {
            cap: config.persistent_peers_cap,
            peers_per_node: config.peers_per_node,
            validators: config.validators,
            seed: config.seed,
        },
        &ctx.stage_deadline(deadline),
    )
    .await?;
    report.persistent_peers = peers.iter().map(PeerInfo::multiaddr).collect();
    report.seeds = collect_seeds(ctx, &ctx.stage_deadline(deadline)).await?;

    let node_config = NodeConfig {
        genesis: Some(genesis.final_genesis_bytes),
        persistent_peers: report.persistent_peers.clone(),
        seeds: report.seeds.clone(),
        ..ctx.node_config()
    };
    ctx.sync.run_stage(NETWORK_CONFIGURED, &participant, async { ctx.write_node_config(&node_config) }).await?;
    let configured = config.validators.saturating_add(config.seeds);
    ctx.sync.barrier(NETWORK_CONFIGURED, configured, &ctx.stage_deadline(deadline)).await?;

    let stage = ctx.stage_deadline(deadline);
    let mut task = NodeTask::spawn(ctx.node.clone(), ctx.start_options(node_config, None), deadline);
    let params = ctx.announce_params(config.validators);
    let (_, announced) = tokio::try_join!(task.started(&stage), async {
        announce_service(&ctx.sync, ctx.node.as_ref(), &VALIDATOR_DESCRIPTORS, &params, &stage)
            .await
            .map_err(NodeError::from)
    })?;
    report.announced = Some(announced);

    if ctx.instance.is_orchestrator() {
        let funder: &dyn AccountFunder = ctx.node.as_ref();
        let served = ctx
            .sync
            .run_stage(
                ACCOUNTS_FUNDED,
                &participant,
                serve_funding(
                    &ctx.sync,
                    funder,
                    config.expected_funding_requests(),
                    config.funding_amount,
                    &ctx.stage_deadline(deadline),
                ),
            )
            .await?;
        report.funded = served.into_iter().map(|request| request.account).collect();
        info!(instance = %ctx.instance, funded = report.funded.len(), "accounts funded");
    }

    ctx.await_teardown(deadline).await?;
    ctx.stop_node().await?;
    Ok(report)
}

/// Multiaddrs of every seed node, ordered by global sequence number.
async fn collect_seeds(ctx: &RoleContext, deadline: &RunDeadline) -> Result<Vec<String>, NodeError> {
    if ctx.config.seeds == 0 {
        return Ok(Vec::new());
    }
    let mut seeds = ctx
        .sync
        .subscribe(&SEED_PEERS)?
        .collect_distinct(ctx.config.seeds, |peer| peer.global_seq, deadline)
        .await?;
    seeds.sort_by_key(|peer| peer.global_seq);
    Ok(seeds.iter().map(PeerInfo::multiaddr).collect())
}
