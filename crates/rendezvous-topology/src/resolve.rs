//! Downstream side: wait for the one matching upstream.

use rendezvous_core::RunDeadline;
use rendezvous_network::ServiceDescriptor;
use rendezvous_sync::SyncClient;
use rendezvous_sync::SyncError;
use rendezvous_sync::Topic;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::TopologyError;
use crate::error::UpstreamUnavailableSnafu;
use crate::pure::descriptor_matches;

/// Return the first descriptor on `topic` that matches `consumer_seq`.
///
/// Non-matching descriptors are read and discarded. Descriptors with a zero
/// group size are skipped with a warning. If the topic closes or the
/// deadline trips first, returns [`TopologyError::UpstreamUnavailable`].
///
/// The returned descriptor's trusted checkpoint must be used verbatim.
pub async fn resolve_upstream(
    sync: &SyncClient,
    topic: &Topic<ServiceDescriptor>,
    consumer_seq: u32,
    deadline: &RunDeadline,
) -> Result<ServiceDescriptor, TopologyError> {
    let mut subscription = sync.subscribe(topic)?;
    let mut discarded = 0u32;

    loop {
        let descriptor = match subscription.next(deadline).await {
            Ok(descriptor) => descriptor,
            Err(err @ (SyncError::Deadline { .. } | SyncError::SubscriptionClosed { .. })) => {
                return UpstreamUnavailableSnafu {
                    topic: topic.name(),
                    consumer: consumer_seq,
                    reason: format!("{err} after discarding {discarded} descriptors"),
                }
                .fail();
            }
            Err(err) => return Err(err.into()),
        };

        if !descriptor.is_well_formed() {
            warn!(topic = %topic, id = descriptor.id, "skipping descriptor with zero group size");
            discarded += 1;
            continue;
        }
        if !descriptor_matches(&descriptor, consumer_seq) {
            debug!(topic = %topic, id = descriptor.id, consumer_seq, "descriptor belongs to another partition");
            discarded += 1;
            continue;
        }

        info!(
            topic = %topic,
            consumer_seq,
            upstream = descriptor.id,
            checkpoint = %descriptor.trusted_checkpoint,
            "resolved upstream"
        );
        return Ok(descriptor);
    }
}
