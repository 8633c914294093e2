/// Integration tests for the genesis protocol across several validators
/// sharing one store.
///
/// Validators start in shuffled order; duplicate identities and foreign
/// join transactions must not change the outcome.
use std::sync::Arc;
use std::time::Duration;

use rendezvous_bootstrap::DeterministicGenesisToolkit;
use rendezvous_bootstrap::FinalizedGenesis;
use rendezvous_bootstrap::GenesisCoordinator;
use rendezvous_bootstrap::GenesisParams;
use rendezvous_bootstrap::GenesisToolkit;
use rendezvous_core::DeterministicKeyValueStore;
use rendezvous_core::RunDeadline;
use rendezvous_network::AccountAddress;
use rendezvous_network::Instance;
use rendezvous_network::JoinTransaction;
use rendezvous_network::Role;
use rendezvous_network::Subnet;
use rendezvous_network::ValidatorIdentity;
use rendezvous_network::assign_address;
use rendezvous_network::protocol::JOIN_TRANSACTIONS;
use rendezvous_network::protocol::VALIDATOR_IDENTITIES;
use rendezvous_sync::SyncClient;
use rendezvous_sync::SyncConfig;

const RUN_ID: &str = "genesis-it";

fn sync(store: &Arc<DeterministicKeyValueStore>) -> SyncClient {
    SyncClient::with_config(store.clone(), RUN_ID, SyncConfig::with_poll_interval_ms(2)).unwrap()
}

fn params(validators: u32) -> GenesisParams {
    GenesisParams {
        chain_id: "it-chain".into(),
        validators,
        stake: 5_000,
    }
}

async fn run_validators(store: &Arc<DeterministicKeyValueStore>, order: &[u32], validators: u32) -> Vec<FinalizedGenesis> {
    let toolkit: Arc<dyn GenesisToolkit> = Arc::new(DeterministicGenesisToolkit::new(RUN_ID));
    let mut handles = Vec::new();
    for &seq in order {
        let coordinator = GenesisCoordinator::new(
            sync(store),
            toolkit.clone(),
            Instance::new(seq, seq, Role::Validator),
            Subnet::default(),
            params(validators),
        );
        handles.push(tokio::spawn(async move {
            let deadline = RunDeadline::after(Duration::from_secs(10));
            coordinator.run(&deadline).await
        }));
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }
    results
}

#[tokio::test]
async fn test_four_validators_finalize_identical_membership() {
    let store = DeterministicKeyValueStore::new();
    let results = run_validators(&store, &[3, 1, 4, 2], 4).await;

    let first = &results[0];
    assert_eq!(first.bundle.validator_accounts.len(), 4);
    assert_eq!(first.membership.len(), 4);
    for result in &results {
        assert_eq!(result.bundle, first.bundle);
        assert_eq!(result.membership, first.membership);
        assert_eq!(result.final_genesis_bytes, first.final_genesis_bytes);
    }
}

#[tokio::test]
async fn test_duplicate_identities_counted_once() {
    let store = DeterministicKeyValueStore::new();
    let toolkit = DeterministicGenesisToolkit::new(RUN_ID);

    // Validator 2 re-publishes its identity before anyone starts.
    let duplicate = ValidatorIdentity {
        global_seq: 2,
        group_seq: 2,
        account: toolkit.identity_account(&Instance::new(2, 2, Role::Validator)),
        address: assign_address(&Subnet::default(), 2),
    };
    let client = sync(&store);
    client.publish(&VALIDATOR_IDENTITIES, &duplicate).await.unwrap();
    client.publish(&VALIDATOR_IDENTITIES, &duplicate).await.unwrap();

    let results = run_validators(&store, &[1, 2, 3], 3).await;
    let accounts: Vec<_> = results[0].bundle.validator_accounts.iter().map(|a| a.address.clone()).collect();
    assert_eq!(accounts.len(), 3);
    let mut deduped = accounts.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), 3);
}

#[tokio::test]
async fn test_genesis_accounts_ordered_by_global_seq() {
    let store = DeterministicKeyValueStore::new();
    let toolkit = DeterministicGenesisToolkit::new(RUN_ID);
    let results = run_validators(&store, &[4, 3, 2, 1], 4).await;

    let expected: Vec<AccountAddress> =
        (1..=4).map(|seq| toolkit.identity_account(&Instance::new(seq, seq, Role::Validator))).collect();
    let actual: Vec<AccountAddress> =
        results[0].bundle.validator_accounts.iter().map(|a| a.address.clone()).collect();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_foreign_join_transactions_ignored() {
    let store = DeterministicKeyValueStore::new();
    sync(&store)
        .publish(&JOIN_TRANSACTIONS, &JoinTransaction {
            signer: AccountAddress("rdv1intruder".into()),
            bytes: vec![0xde, 0xad],
        })
        .await
        .unwrap();

    let results = run_validators(&store, &[2, 1], 2).await;
    for result in &results {
        assert_eq!(result.membership.len(), 2);
        assert!(!result.membership.contains(&AccountAddress("rdv1intruder".into())));
    }
}
