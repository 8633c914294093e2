//! Pure upstream selection.
//!
//! A downstream consumer with group sequence `s` pairs with the upstream
//! descriptor whose `id` is congruent to `s` modulo the upstream group size.
//! With M upstreams and ids 1..=M exactly one descriptor matches any `s`.

use rendezvous_network::ServiceDescriptor;

/// True if a consumer with `consumer_seq` pairs with `descriptor_id`.
///
/// Always false for `group_size == 0`.
#[inline]
pub fn is_partition_match(consumer_seq: u32, descriptor_id: u32, group_size: u32) -> bool {
    group_size > 0 && consumer_seq % group_size == descriptor_id % group_size
}

/// True if `descriptor` is well formed and matches `consumer_seq`.
#[inline]
pub fn descriptor_matches(descriptor: &ServiceDescriptor, consumer_seq: u32) -> bool {
    is_partition_match(consumer_seq, descriptor.id, descriptor.group_size)
}

/// First descriptor in arrival order that matches `consumer_seq`.
pub fn select_descriptor(descriptors: &[ServiceDescriptor], consumer_seq: u32) -> Option<&ServiceDescriptor> {
    descriptors.iter().find(|descriptor| descriptor_matches(descriptor, consumer_seq))
}
