//! End-to-end runs of whole networks in one process.

use std::collections::BTreeSet;
use std::time::Duration;

use rendezvous::DeterministicKeyValueStore;
use rendezvous::FailureKind;
use rendezvous::LightUpstream;
use rendezvous::LocalNetwork;
use rendezvous::Role;
use rendezvous::RunConfig;
use rendezvous::SimulatedNode;
use rendezvous_network::ServiceDescriptor;

fn fast_config(run_id: &str) -> RunConfig {
    RunConfig {
        run_id: run_id.into(),
        poll_interval_ms: 2,
        block_time_ms: 2,
        initial_height: 3,
        settle_delay_ms: 5,
        start_jitter_ms: 10,
        timeout_secs: 20,
        stage_timeout_secs: 20,
        ..RunConfig::default()
    }
}

fn announced(report: &rendezvous::RunReport, role: Role) -> Vec<ServiceDescriptor> {
    report
        .by_role(role)
        .filter_map(|outcome| outcome.report().and_then(|role_report| role_report.announced.clone()))
        .collect()
}

#[tokio::test]
async fn test_four_validators_one_bridge_one_full_node() {
    let config = RunConfig {
        validators: 4,
        bridges: 1,
        full_nodes: 1,
        ..fast_config("e2e")
    };
    let chain_id = config.chain_id.clone();
    let report = LocalNetwork::new(config).run().await.unwrap();

    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.succeeded(), 6, "{report}");

    // Every validator built on the same genesis membership.
    let memberships: Vec<_> = report
        .by_role(Role::Validator)
        .map(|outcome| outcome.report().unwrap().membership.clone())
        .collect();
    assert_eq!(memberships.len(), 4);
    assert_eq!(memberships[0].len(), 4);
    assert!(memberships.iter().all(|membership| membership == &memberships[0]));

    // Checkpoints are real blocks of the chain and flow one tier down.
    let validators = announced(&report, Role::Validator);
    assert_eq!(validators.len(), 4);
    for descriptor in &validators {
        let checkpoint = descriptor.trusted_checkpoint;
        assert_eq!(checkpoint.hash, SimulatedNode::block_hash(&chain_id, checkpoint.height));
    }

    let bridge = report.outcome("bridge-1").unwrap().report().unwrap();
    assert!(validators.contains(bridge.upstream.as_ref().unwrap()));
    let full = report.outcome("full-1").unwrap().report().unwrap();
    assert_eq!(full.upstream, bridge.announced);

    let orchestrator = report.outcome("validator-1").unwrap().report().unwrap();
    assert_eq!(orchestrator.funded.len(), 1);
}

#[tokio::test]
async fn test_shuffled_run_with_seeds_and_light_nodes() {
    let config = RunConfig {
        seed: 42,
        validators: 3,
        seeds: 2,
        bridges: 2,
        full_nodes: 2,
        light_nodes: 3,
        light_upstream: LightUpstream::Full,
        ..fast_config("shuffled")
    };
    let report = LocalNetwork::new(config).run().await.unwrap();

    assert_eq!(report.succeeded(), 12, "{report}");

    for outcome in report.by_role(Role::Validator) {
        let validator = outcome.report().unwrap();
        assert_eq!(validator.seeds.len(), 2);
        assert!(!validator.persistent_peers.is_empty());
    }

    let orchestrator = report.outcome("validator-1").unwrap().report().unwrap();
    let funded: BTreeSet<_> = orchestrator.funded.iter().collect();
    assert_eq!(funded.len(), 5, "bridges and light nodes are funded once each");

    let fulls = announced(&report, Role::Full);
    assert_eq!(fulls.len(), 2);
    for outcome in report.by_role(Role::Light) {
        let upstream = outcome.report().unwrap().upstream.clone().unwrap();
        assert!(fulls.contains(&upstream), "light nodes sync from full nodes");
    }
}

#[tokio::test]
async fn test_concurrent_runs_share_a_store_without_interference() {
    let store = DeterministicKeyValueStore::new();
    let first = LocalNetwork::new(RunConfig {
        validators: 2,
        full_nodes: 0,
        ..fast_config("run-a")
    })
    .with_store(store.clone());
    let second = LocalNetwork::new(RunConfig {
        validators: 3,
        full_nodes: 0,
        ..fast_config("run-b")
    })
    .with_store(store);

    let (first, second) = tokio::join!(first.run(), second.run());
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.succeeded(), 3, "{first}");
    assert_eq!(second.succeeded(), 4, "{second}");
    let first_membership = &first.outcome("validator-1").unwrap().report().unwrap().membership;
    let second_membership = &second.outcome("validator-1").unwrap().report().unwrap().membership;
    assert_eq!(first_membership.len(), 2);
    assert_eq!(second_membership.len(), 3);
}

#[tokio::test]
async fn test_rerun_with_same_run_id_starts_from_a_clean_namespace() {
    let store = DeterministicKeyValueStore::new();
    let config = RunConfig {
        validators: 2,
        full_nodes: 0,
        ..fast_config("rerun")
    };

    let first = LocalNetwork::new(config.clone()).with_store(store.clone()).run().await.unwrap();
    let second = LocalNetwork::new(RunConfig {
        chain_id: "rerun-chain".into(),
        ..config
    })
    .with_store(store)
    .run()
    .await
    .unwrap();

    assert_eq!(first.succeeded(), 3, "{first}");
    assert_eq!(second.succeeded(), 3, "{second}");
    // The bridge adopted a checkpoint of the second chain, not a replayed one.
    let upstream = second.outcome("bridge-1").unwrap().report().unwrap().upstream.clone().unwrap();
    let checkpoint = upstream.trusted_checkpoint;
    assert_eq!(checkpoint.hash, SimulatedNode::block_hash("rerun-chain", checkpoint.height));
}

#[tokio::test]
async fn test_node_configs_are_written_under_home_dir() {
    let home = tempfile::tempdir().unwrap();
    let config = RunConfig {
        validators: 1,
        bridges: 1,
        full_nodes: 0,
        home_dir: Some(home.path().to_path_buf()),
        ..fast_config("on-disk")
    };
    let report = LocalNetwork::new(config).run().await.unwrap();
    assert_eq!(report.succeeded(), 2, "{report}");

    let content = std::fs::read_to_string(home.path().join("bridge-1/config/config.toml")).unwrap();
    let table: toml::Table = content.parse().unwrap();
    let upstream = report.outcome("bridge-1").unwrap().report().unwrap().upstream.clone().unwrap();

    assert_eq!(table["upstream"]["multiaddr"].as_str(), Some(upstream.multiaddr.as_str()));
    assert_eq!(
        table["header"]["trusted_height"].as_integer(),
        Some(upstream.trusted_checkpoint.height as i64)
    );
    assert_eq!(table["chain_id"].as_str(), Some("rendezvous-local"));
}

#[tokio::test]
async fn test_stalled_chain_terminates_within_deadline() {
    let config = RunConfig {
        validators: 1,
        bridges: 1,
        full_nodes: 1,
        timeout_secs: 1,
        stage_timeout_secs: 1,
        ..fast_config("stalled")
    };
    let network = LocalNetwork::new(config).with_node_options(|_, options| options.stall_at = Some(1));

    let report = tokio::time::timeout(Duration::from_secs(10), network.run()).await.unwrap().unwrap();

    assert_eq!(report.succeeded(), 0, "{report}");
    assert!(report.has_fatal_failure());
    let validator = report.outcome("validator-1").unwrap().failure().unwrap();
    assert_eq!(validator.kind, FailureKind::Liveness);
    let bridge = report.outcome("bridge-1").unwrap().failure().unwrap();
    assert_eq!(bridge.kind, FailureKind::UpstreamUnavailable);
}

#[tokio::test]
async fn test_failed_bridge_counts_as_done_for_validators() {
    let config = RunConfig {
        validators: 2,
        bridges: 1,
        full_nodes: 1,
        timeout_secs: 5,
        stage_timeout_secs: 1,
        ..fast_config("bad-bridge")
    };
    let network = LocalNetwork::new(config).with_node_options(|instance, options| {
        if instance.role == Role::Bridge {
            options.fail_start = Some("disk full".into());
        }
    });

    let report = tokio::time::timeout(Duration::from_secs(15), network.run()).await.unwrap().unwrap();

    let bridge = report.outcome("bridge-1").unwrap().failure().unwrap();
    assert_eq!(bridge.kind, FailureKind::Lifecycle);
    assert!(bridge.message.contains("disk full"), "{}", bridge.message);
    let full = report.outcome("full-1").unwrap().failure().unwrap();
    assert_eq!(full.kind, FailureKind::UpstreamUnavailable);

    // Failed downstream instances count as done, so validators still tear down.
    assert!(report.by_role(Role::Validator).all(|outcome| outcome.is_success()), "{report}");
    assert!(report.has_fatal_failure());
}

#[tokio::test]
async fn test_failed_light_node_does_not_stop_upstream_of_live_peer() {
    let boot_delay = Duration::from_millis(600);
    let config = RunConfig {
        validators: 1,
        bridges: 1,
        full_nodes: 0,
        light_nodes: 2,
        ..fast_config("light-failure")
    };
    let network = LocalNetwork::new(config).with_node_options(move |instance, options| match instance.label().as_str() {
        "light-1" => options.fail_start = Some("corrupt home".into()),
        "light-2" => options.boot_delay = boot_delay,
        _ => {}
    });

    let report = network.run().await.unwrap();

    let failed = report.outcome("light-1").unwrap().failure().unwrap();
    assert_eq!(failed.kind, FailureKind::Lifecycle);
    let live = report.outcome("light-2").unwrap();
    assert!(live.is_success(), "{report}");
    assert!(live.elapsed >= boot_delay);

    // The bridge and validator serve light-2 until it is synced.
    for label in ["bridge-1", "validator-1"] {
        let upstream = report.outcome(label).unwrap();
        assert!(upstream.is_success(), "{report}");
        assert!(upstream.elapsed >= boot_delay, "{label} stopped after {:?}", upstream.elapsed);
    }
}

#[tokio::test]
async fn test_same_seed_gives_same_membership() {
    let run = |run_id: &'static str| async move {
        let report = LocalNetwork::new(RunConfig {
            validators: 3,
            full_nodes: 0,
            ..fast_config(run_id)
        })
        .run()
        .await
        .unwrap();
        report.outcome("validator-1").unwrap().report().unwrap().membership.clone()
    };
    assert_eq!(run("repeat").await, run("repeat").await);
}
