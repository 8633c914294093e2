//! Reading side of a topic.

use std::collections::BTreeSet;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use rendezvous_core::RunDeadline;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::sync::DropGuard;
use tracing::debug;

use crate::error::IncompleteSnafu;
use crate::error::SubscriptionClosedSnafu;
use crate::error::SyncError;

/// Values buffered between a subscription's poller and its reader.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 64;

/// An independent cursor over one topic.
///
/// Every subscription sees every publication of its topic, in the same order
/// as every other subscription, starting from where it was opened. Dropping
/// the subscription stops its background poller.
pub struct Subscription<T> {
    topic: String,
    receiver: mpsc::Receiver<Result<T, SyncError>>,
    _poller: DropGuard,
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("topic", &self.topic).finish_non_exhaustive()
    }
}

impl<T> Subscription<T> {
    pub(crate) fn new(topic: String, receiver: mpsc::Receiver<Result<T, SyncError>>, cancel: CancellationToken) -> Self {
        Self {
            topic,
            receiver,
            _poller: cancel.drop_guard(),
        }
    }

    /// Topic this subscription reads.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next value.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Deadline`] if `deadline` trips or is cancelled first
    /// - [`SyncError::SubscriptionClosed`] if the client shut down
    /// - [`SyncError::CorruptedData`] or [`SyncError::Storage`] if the log
    ///   could not be read; the subscription is closed afterwards
    pub async fn next(&mut self, deadline: &RunDeadline) -> Result<T, SyncError> {
        let operation = format!("next value on topic '{}'", self.topic);
        match deadline.race(operation, self.receiver.recv()).await? {
            Some(item) => item,
            None => SubscriptionClosedSnafu {
                topic: self.topic.clone(),
            }
            .fail(),
        }
    }

    /// Read until `expected` values with distinct keys have arrived.
    ///
    /// Values whose key was already seen are dropped. Values are returned in
    /// arrival order. If the deadline trips or the subscription closes first,
    /// returns [`SyncError::Incomplete`] with the number of distinct values
    /// received.
    pub async fn collect_distinct<K, F>(
        &mut self,
        expected: u32,
        mut key_fn: F,
        deadline: &RunDeadline,
    ) -> Result<Vec<T>, SyncError>
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        let mut seen = BTreeSet::new();
        let mut values = Vec::with_capacity(expected as usize);

        while values.len() < expected as usize {
            match self.next(deadline).await {
                Ok(value) => {
                    if seen.insert(key_fn(&value)) {
                        values.push(value);
                    } else {
                        debug!(topic = %self.topic, "dropping duplicate value");
                    }
                }
                Err(err @ (SyncError::Deadline { .. } | SyncError::SubscriptionClosed { .. })) => {
                    return IncompleteSnafu {
                        topic: self.topic.clone(),
                        expected,
                        received: values.len() as u32,
                        reason: err.to_string(),
                    }
                    .fail();
                }
                Err(err) => return Err(err),
            }
        }

        Ok(values)
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, SyncError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use rendezvous_core::DeterministicKeyValueStore;
    use serde::Deserialize;
    use serde::Serialize;

    use super::*;
    use crate::SyncClient;
    use crate::SyncConfig;
    use crate::Topic;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Identity {
        seq: u32,
        name: String,
    }

    const IDENTITIES: Topic<Identity> = Topic::new("identities");

    fn client() -> SyncClient {
        SyncClient::with_config(DeterministicKeyValueStore::new(), "sub-test", SyncConfig::with_poll_interval_ms(5))
            .unwrap()
    }

    fn identity(seq: u32) -> Identity {
        Identity {
            seq,
            name: format!("node-{seq}"),
        }
    }

    #[tokio::test]
    async fn test_collect_distinct_drops_duplicates() {
        let client = client();
        for seq in [1, 2, 2, 3, 1] {
            client.publish(&IDENTITIES, &identity(seq)).await.unwrap();
        }

        let deadline = RunDeadline::after(Duration::from_secs(5));
        let mut sub = client.subscribe(&IDENTITIES).unwrap();
        let values = sub.collect_distinct(3, |id| id.seq, &deadline).await.unwrap();
        assert_eq!(values.iter().map(|id| id.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_collect_distinct_reports_shortfall() {
        let client = client();
        client.publish(&IDENTITIES, &identity(1)).await.unwrap();
        client.publish(&IDENTITIES, &identity(1)).await.unwrap();

        let deadline = RunDeadline::after(Duration::from_millis(100));
        let mut sub = client.subscribe(&IDENTITIES).unwrap();
        let err = sub.collect_distinct(4, |id| id.seq, &deadline).await.unwrap_err();
        match err {
            SyncError::Incomplete { expected, received, .. } => {
                assert_eq!(expected, 4);
                assert_eq!(received, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_closes_pending_subscription() {
        let client = client();
        let mut sub = client.subscribe(&IDENTITIES).unwrap();

        let closer = client.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.shutdown();
        });

        let deadline = RunDeadline::after(Duration::from_secs(5));
        let err = sub.next(&deadline).await.unwrap_err();
        assert!(matches!(err, SyncError::SubscriptionClosed { .. }));
    }

    #[tokio::test]
    async fn test_independent_cursors() {
        let client = client();
        client.publish(&IDENTITIES, &identity(1)).await.unwrap();
        client.publish(&IDENTITIES, &identity(2)).await.unwrap();

        let deadline = RunDeadline::after(Duration::from_secs(5));
        let mut first = client.subscribe(&IDENTITIES).unwrap();
        let mut second = client.subscribe(&IDENTITIES).unwrap();

        assert_eq!(first.next(&deadline).await.unwrap().seq, 1);
        assert_eq!(first.next(&deadline).await.unwrap().seq, 2);
        // The second subscriber still starts at the beginning.
        assert_eq!(second.next(&deadline).await.unwrap().seq, 1);
    }

    #[tokio::test]
    async fn test_stream_yields_values() {
        let client = client();
        for seq in 1..=3 {
            client.publish(&IDENTITIES, &identity(seq)).await.unwrap();
        }

        let sub = client.subscribe(&IDENTITIES).unwrap();
        let values: Vec<_> = sub.take(3).map(|item| item.unwrap().seq).collect().await;
        assert_eq!(values, vec![1, 2, 3]);
    }
}
