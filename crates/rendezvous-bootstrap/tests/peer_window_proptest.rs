/// Property-based tests for persistent peer selection.
///
/// - A validator never selects itself or the same peer twice
/// - The window has `min(peers_per_node, others)` entries
/// - Selection ignores the order candidates arrived in
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use proptest::prelude::*;
use rendezvous_bootstrap::pure::select_peer_window;
use rendezvous_network::PeerInfo;

fn peer(seq: u32) -> PeerInfo {
    PeerInfo {
        global_seq: seq,
        node_id: format!("node-{seq}"),
        address: Ipv4Addr::from(0x0A00_0000 + seq),
        port: 26656,
    }
}

fn candidates() -> impl Strategy<Value = Vec<PeerInfo>> {
    prop::collection::btree_set(1u32..200, 0..40).prop_map(|seqs| seqs.into_iter().map(peer).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn test_window_is_distinct_and_excludes_self(
        peers in candidates(),
        own in 1u32..200,
        per_node in 0u32..12,
        seed in any::<u64>(),
    ) {
        let others = peers.iter().filter(|peer| peer.global_seq != own).count();
        let selected = select_peer_window(peers, own, per_node, seed);

        let seqs: BTreeSet<u32> = selected.iter().map(|peer| peer.global_seq).collect();
        prop_assert_eq!(seqs.len(), selected.len());
        prop_assert!(!seqs.contains(&own));
        prop_assert_eq!(selected.len(), (per_node as usize).min(others));
    }

    #[test]
    fn test_window_ignores_arrival_order(
        peers in candidates(),
        own in 1u32..200,
        per_node in 1u32..12,
        seed in any::<u64>(),
    ) {
        let mut reversed = peers.clone();
        reversed.reverse();
        prop_assert_eq!(
            select_peer_window(peers, own, per_node, seed),
            select_peer_window(reversed, own, per_node, seed)
        );
    }
}
