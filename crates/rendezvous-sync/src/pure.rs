//! Pure decision functions for topics and barriers.
//!
//! Deterministic and side-effect free: no I/O, no clocks. The async shell
//! in [`crate::client`] and [`crate::barrier`] calls these so the rules can
//! be tested without a store.
//!
//! All arithmetic saturates.

use rendezvous_core::CAS_RETRY_MAX_BACKOFF_MS;

/// True once `count` signals satisfy a wait for `target`.
///
/// A target of zero is satisfied immediately.
#[inline]
pub fn is_barrier_satisfied(count: u32, target: u32) -> bool {
    count >= target
}

/// Count after one more entry signal.
#[inline]
pub fn compute_next_count(count: u32) -> u32 {
    count.saturating_add(1)
}

/// True if a waiter should stop waiting because a peer failed.
///
/// Waiters whose threshold is already met are never failed: the barrier
/// opened before (or despite) the failure.
#[inline]
pub fn should_fail_fast(count: u32, target: u32, failure_count: usize) -> bool {
    failure_count > 0 && !is_barrier_satisfied(count, target)
}

/// True once every one of `target` participants either signalled or failed.
#[inline]
pub fn is_settled(count: u32, failure_count: usize, target: u32) -> bool {
    let failures = u32::try_from(failure_count).unwrap_or(u32::MAX);
    count.saturating_add(failures) >= target
}

/// Next CAS backoff: doubles, capped at [`CAS_RETRY_MAX_BACKOFF_MS`].
#[inline]
pub fn compute_next_backoff_ms(current_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(CAS_RETRY_MAX_BACKOFF_MS)
}

/// First sequence number a publisher should try to claim.
///
/// `head_hint` is the last claimed sequence as far as the publisher knows
/// (0 for an empty topic). The hint may lag; the caller tries forward from there.
#[inline]
pub fn first_publish_slot(head_hint: u64) -> u64 {
    head_hint.saturating_add(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_counts_failures_as_done() {
        assert!(is_settled(0, 0, 0));
        assert!(!is_settled(1, 0, 2));
        assert!(is_settled(1, 1, 2));
        assert!(is_settled(0, 2, 2));
        assert!(!is_settled(0, 1, 2));
    }

    #[test]
    fn test_barrier_satisfied() {
        assert!(is_barrier_satisfied(0, 0));
        assert!(!is_barrier_satisfied(2, 3));
        assert!(is_barrier_satisfied(3, 3));
        assert!(is_barrier_satisfied(7, 3));
    }

    #[test]
    fn test_next_count_saturates() {
        assert_eq!(compute_next_count(4), 5);
        assert_eq!(compute_next_count(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_fail_fast_only_below_threshold() {
        assert!(!should_fail_fast(1, 3, 0));
        assert!(should_fail_fast(1, 3, 1));
        assert!(!should_fail_fast(3, 3, 1));
    }

    #[test]
    fn test_backoff_capped() {
        assert_eq!(compute_next_backoff_ms(1), 2);
        assert_eq!(compute_next_backoff_ms(CAS_RETRY_MAX_BACKOFF_MS), CAS_RETRY_MAX_BACKOFF_MS);
        assert_eq!(compute_next_backoff_ms(u64::MAX), CAS_RETRY_MAX_BACKOFF_MS);
    }

    #[test]
    fn test_first_publish_slot() {
        assert_eq!(first_publish_slot(0), 1);
        assert_eq!(first_publish_slot(9), 10);
        assert_eq!(first_publish_slot(u64::MAX), u64::MAX);
    }
}
