//! Upstream side: prove liveness, then publish one descriptor.

use std::time::Duration;

use async_trait::async_trait;
use rendezvous_core::BoxError;
use rendezvous_core::RunDeadline;
use rendezvous_network::BlockHash;
use rendezvous_network::ServiceDescriptor;
use rendezvous_network::TrustedCheckpoint;
use rendezvous_sync::SyncClient;
use rendezvous_sync::Topic;
use snafu::ResultExt;
use tracing::debug;
use tracing::info;

use crate::error::LivenessSnafu;
use crate::error::NodeSnafu;
use crate::error::TopologyError;

/// Chain view of a running node.
#[async_trait]
pub trait HeightSource: Send + Sync {
    /// Highest block the node has.
    async fn latest_height(&self) -> Result<u64, BoxError>;

    /// Hash of the block at `height`.
    async fn height_hash(&self, height: u64) -> Result<BlockHash, BoxError>;
}

/// What an upstream instance announces and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceParams {
    /// Publisher's group sequence number.
    pub id: u32,
    pub multiaddr: String,
    /// Number of upstream instances in this tier.
    pub group_size: u32,
    /// Height the node must reach; its hash becomes the trusted checkpoint.
    pub initial_height: u64,
    /// Unconditional wait after reaching the height, before publishing.
    pub settle_delay: Duration,
    /// Interval between height polls.
    pub height_poll_interval: Duration,
}

/// Wait until `node` reports at least `height`.
///
/// Query errors are treated as "not there yet" and retried until the
/// deadline trips.
pub async fn wait_for_height<H>(
    node: &H,
    height: u64,
    poll_interval: Duration,
    deadline: &RunDeadline,
) -> Result<u64, TopologyError>
where
    H: HeightSource + ?Sized,
{
    let mut reached = 0;
    loop {
        match node.latest_height().await {
            Ok(current) if current >= height => return Ok(current),
            Ok(current) => reached = current,
            Err(err) => debug!(error = %err, "height query failed, retrying"),
        }
        deadline
            .sleep(format!("node to reach height {height}"), poll_interval)
            .await
            .context(LivenessSnafu { height, reached })?;
    }
}

/// Publish this instance's descriptor on `topic` once its node is live.
///
/// Waits for `initial_height`, waits `settle_delay`, reads the hash at
/// `initial_height` as the trusted checkpoint and publishes exactly one
/// descriptor.
pub async fn announce_service<H>(
    sync: &SyncClient,
    node: &H,
    topic: &Topic<ServiceDescriptor>,
    params: &AnnounceParams,
    deadline: &RunDeadline,
) -> Result<ServiceDescriptor, TopologyError>
where
    H: HeightSource + ?Sized,
{
    let reached = wait_for_height(node, params.initial_height, params.height_poll_interval, deadline).await?;
    debug!(topic = %topic, id = params.id, height = reached, "node is live");

    if !params.settle_delay.is_zero() {
        deadline
            .sleep("settle before announcing", params.settle_delay)
            .await
            .context(LivenessSnafu {
                height: params.initial_height,
                reached,
            })?;
    }

    let hash = node.height_hash(params.initial_height).await.context(NodeSnafu {
        operation: format!("read hash at height {}", params.initial_height),
    })?;

    let descriptor = ServiceDescriptor {
        id: params.id,
        multiaddr: params.multiaddr.clone(),
        trusted_checkpoint: TrustedCheckpoint {
            height: params.initial_height,
            hash,
        },
        group_size: params.group_size,
    };
    let seq = sync.publish(topic, &descriptor).await?;
    info!(
        topic = %topic,
        id = descriptor.id,
        group_size = descriptor.group_size,
        checkpoint = %descriptor.trusted_checkpoint,
        seq,
        "announced service"
    );
    Ok(descriptor)
}
