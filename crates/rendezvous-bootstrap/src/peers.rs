//! Persistent peer exchange between validators.

use rendezvous_core::RunDeadline;
use rendezvous_network::Instance;
use rendezvous_network::PeerInfo;
use rendezvous_network::protocol::PERSISTENT_PEERS;
use rendezvous_sync::SyncClient;
use tracing::debug;
use tracing::info;

use crate::error::BootstrapError;
use crate::error::InvalidParametersSnafu;
use crate::pure::expected_peer_infos;
use crate::pure::publishes_peer_info;
use crate::pure::select_peer_window;

/// Parameters of the persistent peer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerExchangeParams {
    /// Validators with `group_seq <= cap` publish their peer info.
    pub cap: u32,
    /// Size of each validator's peer window.
    pub peers_per_node: u32,
    /// Size of the validator group.
    pub validators: u32,
    /// Run seed; fixes every validator's window start.
    pub seed: u64,
}

/// Publish this validator's peer info if its rank is within the cap, then
/// collect the published infos and select a peer window.
///
/// Returns the selected peers ordered along the ring, starting at the
/// window start.
pub async fn exchange_peers(
    sync: &SyncClient,
    instance: &Instance,
    own: &PeerInfo,
    params: PeerExchangeParams,
    deadline: &RunDeadline,
) -> Result<Vec<PeerInfo>, BootstrapError> {
    if params.cap == 0 {
        return InvalidParametersSnafu {
            reason: "persistent peer cap is zero",
        }
        .fail();
    }

    let mut subscription = if publishes_peer_info(instance.group_seq, params.cap) {
        let (seq, subscription) = sync.publish_subscribe(&PERSISTENT_PEERS, own).await?;
        debug!(instance = %instance, seq, multiaddr = %own.multiaddr(), "published peer info");
        subscription
    } else {
        sync.subscribe(&PERSISTENT_PEERS)?
    };

    let expected = expected_peer_infos(params.cap, params.validators);
    let candidates = subscription
        .collect_distinct(expected, |peer| peer.global_seq, deadline)
        .await
        .map_err(|err| BootstrapError::from_collection("collecting persistent peers", err))?;

    let selected = select_peer_window(candidates, instance.global_seq, params.peers_per_node, params.seed);
    info!(instance = %instance, peers = selected.len(), "selected persistent peers");
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rendezvous_core::DeterministicKeyValueStore;
    use rendezvous_network::Role;
    use rendezvous_network::Subnet;
    use rendezvous_network::assign_address;
    use rendezvous_sync::SyncConfig;

    use super::*;

    fn sync(store: &Arc<DeterministicKeyValueStore>) -> SyncClient {
        SyncClient::with_config(store.clone(), "peers-test", SyncConfig::with_poll_interval_ms(2)).unwrap()
    }

    fn peer_info(seq: u32) -> PeerInfo {
        PeerInfo {
            global_seq: seq,
            node_id: format!("node-{seq}"),
            address: assign_address(&Subnet::default(), seq),
            port: 26656,
        }
    }

    #[tokio::test]
    async fn test_validators_beyond_cap_only_listen() {
        let store = DeterministicKeyValueStore::new();
        let params = PeerExchangeParams {
            cap: 2,
            peers_per_node: 1,
            validators: 4,
            seed: 9,
        };

        let mut handles = Vec::new();
        for seq in 1..=4u32 {
            let sync = sync(&store);
            handles.push(tokio::spawn(async move {
                let deadline = RunDeadline::after(Duration::from_secs(5));
                let instance = Instance::new(seq, seq, Role::Validator);
                exchange_peers(&sync, &instance, &peer_info(seq), params, &deadline).await
            }));
        }

        for (index, handle) in handles.into_iter().enumerate() {
            let seq = index as u32 + 1;
            let selected = handle.await.unwrap().unwrap();
            assert_eq!(selected.len(), 1);
            assert_ne!(selected[0].global_seq, seq);
            assert!(selected[0].global_seq <= 2);
        }
    }

    #[tokio::test]
    async fn test_missing_publishers_is_quorum_failure() {
        let store = DeterministicKeyValueStore::new();
        let params = PeerExchangeParams {
            cap: 3,
            peers_per_node: 2,
            validators: 3,
            seed: 1,
        };
        let deadline = RunDeadline::after(Duration::from_millis(100));
        let instance = Instance::new(1, 1, Role::Validator);
        let err = exchange_peers(&sync(&store), &instance, &peer_info(1), params, &deadline).await.unwrap_err();
        assert!(err.is_quorum_failure());
    }
}
