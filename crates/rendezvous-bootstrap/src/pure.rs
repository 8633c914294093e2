//! Pure bootstrap decisions.
//!
//! Phase transitions, peer quotas and peer window selection. Deterministic:
//! the only randomness is a seeded `StdRng`, so identical inputs give
//! identical outputs across runs.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rendezvous_network::PeerInfo;

use crate::phase::BootstrapPhase;

/// True if a validator may move from `from` to `to`.
///
/// # State Machine
///
/// ```text
/// Init                 -> PublishingIdentity
/// PublishingIdentity   -> CollectingIdentities   (orchestrator)
///                      -> AwaitingGenesis        (participant)
/// CollectingIdentities -> BuildingGenesis -> BroadcastingGenesis -> SigningJoinTx
/// AwaitingGenesis      -> SigningJoinTx
/// SigningJoinTx -> BroadcastingJoinTx -> CollectingJoinTxs -> Finalizing -> Ready
/// any non-terminal     -> Failed
/// ```
pub fn is_valid_transition(from: BootstrapPhase, to: BootstrapPhase, is_orchestrator: bool) -> bool {
    use BootstrapPhase::*;

    if to == Failed {
        return !from.is_terminal();
    }
    match (from, to) {
        (Init, PublishingIdentity) => true,
        (PublishingIdentity, CollectingIdentities) => is_orchestrator,
        (PublishingIdentity, AwaitingGenesis) => !is_orchestrator,
        (CollectingIdentities, BuildingGenesis) => is_orchestrator,
        (BuildingGenesis, BroadcastingGenesis) => is_orchestrator,
        (BroadcastingGenesis, SigningJoinTx) => is_orchestrator,
        (AwaitingGenesis, SigningJoinTx) => !is_orchestrator,
        (SigningJoinTx, BroadcastingJoinTx) => true,
        (BroadcastingJoinTx, CollectingJoinTxs) => true,
        (CollectingJoinTxs, Finalizing) => true,
        (Finalizing, Ready) => true,
        _ => false,
    }
}

/// True if the validator with `group_seq` publishes its peer info.
#[inline]
pub fn publishes_peer_info(group_seq: u32, cap: u32) -> bool {
    group_seq <= cap
}

/// Number of distinct peer infos every validator waits for.
#[inline]
pub fn expected_peer_infos(cap: u32, validators: u32) -> u32 {
    cap.min(validators)
}

/// Select the persistent peers of the validator with `own_global_seq`.
///
/// The candidates (minus the caller) are sorted by global sequence number
/// and treated as a ring. The window starts at an index drawn from a
/// `StdRng` seeded by `(rng_seed, own_global_seq)` and takes
/// `min(peers_per_node, candidates)` consecutive peers, wrapping around the
/// end. The result is empty only if there are no other candidates or
/// `peers_per_node` is zero, and never repeats a peer.
pub fn select_peer_window(
    mut candidates: Vec<PeerInfo>,
    own_global_seq: u32,
    peers_per_node: u32,
    rng_seed: u64,
) -> Vec<PeerInfo> {
    candidates.retain(|peer| peer.global_seq != own_global_seq);
    candidates.sort_by_key(|peer| peer.global_seq);
    candidates.dedup_by_key(|peer| peer.global_seq);

    let available = candidates.len();
    let size = (peers_per_node as usize).min(available);
    if size == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(window_seed(rng_seed, own_global_seq));
    let start = rng.gen_range(0..available);
    (0..size).map(|offset| candidates[(start + offset) % available].clone()).collect()
}

fn window_seed(rng_seed: u64, own_global_seq: u32) -> u64 {
    rng_seed ^ u64::from(own_global_seq).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn peers(seqs: &[u32]) -> Vec<PeerInfo> {
        seqs.iter()
            .map(|&seq| PeerInfo {
                global_seq: seq,
                node_id: format!("node-{seq}"),
                address: Ipv4Addr::new(10, 0, 1, seq as u8),
                port: 26656,
            })
            .collect()
    }

    fn seqs(selected: &[PeerInfo]) -> Vec<u32> {
        selected.iter().map(|p| p.global_seq).collect()
    }

    #[test]
    fn test_orchestrator_and_participant_branches() {
        use BootstrapPhase::*;
        assert!(is_valid_transition(PublishingIdentity, CollectingIdentities, true));
        assert!(!is_valid_transition(PublishingIdentity, CollectingIdentities, false));
        assert!(is_valid_transition(PublishingIdentity, AwaitingGenesis, false));
        assert!(!is_valid_transition(PublishingIdentity, AwaitingGenesis, true));
        assert!(!is_valid_transition(Init, Ready, true));
        assert!(!is_valid_transition(Ready, Failed, true));
        assert!(is_valid_transition(Finalizing, Failed, false));
    }

    #[test]
    fn test_window_excludes_self() {
        let selected = select_peer_window(peers(&[1, 2, 3, 4]), 2, 3, 7);
        assert_eq!(selected.len(), 3);
        assert!(!seqs(&selected).contains(&2));
    }

    #[test]
    fn test_window_capped_by_available() {
        let selected = select_peer_window(peers(&[1, 2, 3]), 1, 10, 7);
        let mut got = seqs(&selected);
        got.sort_unstable();
        assert_eq!(got, vec![2, 3]);
    }

    #[test]
    fn test_window_empty_only_without_peers() {
        assert!(select_peer_window(peers(&[1]), 1, 3, 7).is_empty());
        assert!(select_peer_window(Vec::new(), 1, 3, 7).is_empty());
        assert_eq!(select_peer_window(peers(&[1, 2]), 1, 3, 7).len(), 1);
    }

    #[test]
    fn test_window_is_contiguous_on_ring() {
        let candidates = peers(&[10, 20, 30, 40, 50]);
        let selected = seqs(&select_peer_window(candidates, 99, 3, 42));
        let ring = [10, 20, 30, 40, 50];
        let start = ring.iter().position(|&s| s == selected[0]).unwrap();
        for (offset, seq) in selected.iter().enumerate() {
            assert_eq!(*seq, ring[(start + offset) % ring.len()]);
        }
    }

    #[test]
    fn test_window_deterministic_for_seed() {
        let a = select_peer_window(peers(&[4, 1, 3, 2, 5]), 3, 2, 1234);
        let b = select_peer_window(peers(&[5, 2, 1, 4, 3]), 3, 2, 1234);
        assert_eq!(a, b);
    }

    #[test]
    fn test_peer_quota() {
        assert!(publishes_peer_info(2, 2));
        assert!(!publishes_peer_info(3, 2));
        assert_eq!(expected_peer_infos(10, 4), 4);
        assert_eq!(expected_peer_infos(2, 4), 2);
    }
}
