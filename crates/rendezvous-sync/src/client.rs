//! The coordination handle shared by every component of an instance.
//!
//! [`SyncClient`] owns nothing but a store handle, the run namespace and a
//! shutdown token. Cloning is cheap; every clone talks to the same run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rendezvous_core::DEFAULT_POLL_INTERVAL_MS;
use rendezvous_core::DEFAULT_SCAN_LIMIT;
use rendezvous_core::DeleteRequest;
use rendezvous_core::KeyValueStore;
use rendezvous_core::KeyValueStoreError;
use rendezvous_core::ReadRequest;
use rendezvous_core::ScanRequest;
use rendezvous_core::WriteRequest;
use rendezvous_core::constants::MAX_POLL_INTERVAL_MS;
use rendezvous_core::constants::MAX_PUBLISH_ATTEMPTS;
use rendezvous_core::constants::MIN_POLL_INTERVAL_MS;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::cursor::Cursor;
use crate::error::CorruptedDataSnafu;
use crate::error::MaxRetriesExceededSnafu;
use crate::error::SyncError;
use crate::keys;
use crate::pure::first_publish_slot;
use crate::subscription::SUBSCRIPTION_BUFFER;
use crate::subscription::Subscription;
use crate::topic::Topic;
use crate::topic::validate_name;

/// Tuning for a [`SyncClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Interval between polls of a topic log or barrier state.
    pub poll_interval: Duration,
}

impl SyncConfig {
    /// Config with the poll interval clamped into its allowed range.
    pub fn with_poll_interval_ms(poll_interval_ms: u64) -> Self {
        Self {
            poll_interval: Duration::from_millis(poll_interval_ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::with_poll_interval_ms(DEFAULT_POLL_INTERVAL_MS)
    }
}

/// Handle to one run's topics and states.
///
/// # Examples
///
/// ```
/// # async fn demo() -> Result<(), rendezvous_sync::SyncError> {
/// use rendezvous_core::DeterministicKeyValueStore;
/// use rendezvous_core::RunDeadline;
/// use rendezvous_sync::{SyncClient, Topic};
///
/// const GREETINGS: Topic<String> = Topic::new("greetings");
///
/// let client = SyncClient::new(DeterministicKeyValueStore::new(), "demo")?;
/// let deadline = RunDeadline::after(std::time::Duration::from_secs(5));
///
/// client.publish(&GREETINGS, &"hello".to_string()).await?;
/// let mut sub = client.subscribe(&GREETINGS)?;
/// assert_eq!(sub.next(&deadline).await?, "hello");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SyncClient {
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) run_id: Arc<str>,
    pub(crate) config: SyncConfig,
    pub(crate) shutdown: CancellationToken,
}

impl fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncClient")
            .field("run_id", &self.run_id)
            .field("config", &self.config)
            .field("is_shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SyncClient {
    /// Client for `run_id` with default tuning.
    pub fn new(store: Arc<dyn KeyValueStore>, run_id: impl Into<String>) -> Result<Self, SyncError> {
        Self::with_config(store, run_id, SyncConfig::default())
    }

    /// Client for `run_id` with explicit tuning.
    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        run_id: impl Into<String>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let run_id = run_id.into();
        validate_name(&run_id)?;
        Ok(Self {
            store,
            run_id: Arc::from(run_id),
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// The run namespace.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The tuning this client polls with.
    pub fn config(&self) -> SyncConfig {
        self.config
    }

    /// Close every subscription and barrier wait of this client and its clones.
    ///
    /// Values already published stay in the store.
    pub fn shutdown(&self) {
        debug!(run_id = %self.run_id, "sync client shutting down");
        self.shutdown.cancel();
    }

    /// True once [`SyncClient::shutdown`] was called on any clone.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Delete every key of this run and return how many were removed.
    ///
    /// For a harness that reuses a run id on a shared backend: stale topic
    /// entries would otherwise be replayed and stale counts would open
    /// barriers early. Call it before any instance of the run starts.
    pub async fn purge(&self) -> Result<u64, SyncError> {
        let prefix = keys::run_prefix(&self.run_id);
        let mut removed = 0u64;
        let mut continuation_token = None;

        loop {
            let page = self
                .store
                .scan(ScanRequest {
                    prefix: prefix.clone(),
                    limit: Some(DEFAULT_SCAN_LIMIT),
                    continuation_token,
                })
                .await?;
            for entry in page.entries {
                if self.store.delete(DeleteRequest::new(entry.key)).await?.is_deleted {
                    removed += 1;
                }
            }
            continuation_token = match page.continuation_token {
                Some(token) if page.is_truncated => Some(token),
                _ => break,
            };
        }

        info!(run_id = %self.run_id, removed, "purged run namespace");
        Ok(removed)
    }

    /// Append `value` to `topic` and return its 1-based sequence number.
    ///
    /// Publishers claim the next free entry key with compare-and-swap, so
    /// concurrent publishers never overwrite each other and the log has no
    /// gaps. Values from one publisher keep their publication order.
    pub async fn publish<T: Serialize>(&self, topic: &Topic<T>, value: &T) -> Result<u64, SyncError> {
        topic.validate()?;
        let payload = serde_json::to_string(value)?;
        let head_key = keys::topic_head_key(&self.run_id, topic.name());
        let mut seq = first_publish_slot(self.read_head_hint(&head_key).await?);

        for _ in 0..MAX_PUBLISH_ATTEMPTS {
            let entry_key = keys::topic_entry_key(&self.run_id, topic.name(), seq);
            match self.store.write(WriteRequest::compare_and_swap(entry_key, None, payload.clone())).await {
                Ok(_) => {
                    // The hint only shortens the next attempt; a stale hint is harmless.
                    if let Err(err) = self.store.write(WriteRequest::set(head_key, seq.to_string())).await {
                        debug!(topic = %topic, seq, error = %err, "failed to advance topic head hint");
                    }
                    debug!(run_id = %self.run_id, topic = %topic, seq, "published");
                    return Ok(seq);
                }
                Err(err) if err.is_cas_conflict() => {
                    trace!(topic = %topic, seq, "entry already claimed, probing next");
                    seq = seq.saturating_add(1);
                }
                Err(err) => return Err(err.into()),
            }
        }

        MaxRetriesExceededSnafu {
            operation: format!("publish to topic '{topic}'"),
            attempts: MAX_PUBLISH_ATTEMPTS,
        }
        .fail()
    }

    /// Subscribe to `topic` from its first publication.
    ///
    /// Must be called from within a tokio runtime: the subscription polls
    /// the log on a background task that stops when the subscription is
    /// dropped or the client shuts down.
    pub fn subscribe<T>(&self, topic: &Topic<T>) -> Result<Subscription<T>, SyncError>
    where T: DeserializeOwned + Send + 'static {
        self.subscribe_from(topic, Cursor::FIRST)
    }

    /// Subscribe to `topic` starting at `cursor`.
    pub fn subscribe_from<T>(&self, topic: &Topic<T>, cursor: Cursor) -> Result<Subscription<T>, SyncError>
    where T: DeserializeOwned + Send + 'static {
        topic.validate()?;
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let cancel = self.shutdown.child_token();
        let poller = TopicPoller {
            store: Arc::clone(&self.store),
            run_id: Arc::clone(&self.run_id),
            topic: topic.name().to_string(),
            poll_interval: self.config.poll_interval,
            cancel: cancel.clone(),
        };
        tokio::spawn(poller.run(cursor, sender));
        debug!(run_id = %self.run_id, topic = %topic, cursor = %cursor, "subscribed");
        Ok(Subscription::new(topic.name().to_string(), receiver, cancel))
    }

    /// Publish `value`, then subscribe to the same topic from the beginning.
    ///
    /// The subscription replays the caller's own publication too.
    pub async fn publish_subscribe<T>(&self, topic: &Topic<T>, value: &T) -> Result<(u64, Subscription<T>), SyncError>
    where T: Serialize + DeserializeOwned + Send + 'static {
        let seq = self.publish(topic, value).await?;
        let subscription = self.subscribe(topic)?;
        Ok((seq, subscription))
    }

    async fn read_head_hint(&self, head_key: &str) -> Result<u64, SyncError> {
        let value = match self.store.read(ReadRequest::new(head_key)).await {
            Ok(result) => result.kv.map(|kv| kv.value),
            Err(KeyValueStoreError::NotFound { .. }) => None,
            Err(err) => return Err(err.into()),
        };
        match value {
            None => Ok(0),
            Some(raw) => raw.parse().map_err(|_| {
                CorruptedDataSnafu {
                    key: head_key.to_string(),
                    reason: "head hint is not a valid u64",
                }
                .build()
            }),
        }
    }
}

/// Background reader feeding one subscription.
struct TopicPoller {
    store: Arc<dyn KeyValueStore>,
    run_id: Arc<str>,
    topic: String,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl TopicPoller {
    async fn run<T: DeserializeOwned>(self, mut cursor: Cursor, sender: mpsc::Sender<Result<T, SyncError>>) {
        loop {
            let key = keys::topic_entry_key(&self.run_id, &self.topic, cursor.seq());
            let item = match self.store.read(ReadRequest::new(key.clone())).await {
                Ok(result) => match result.kv {
                    Some(kv) => Some(serde_json::from_str::<T>(&kv.value).map_err(|err| {
                        CorruptedDataSnafu {
                            key: key.clone(),
                            reason: err.to_string(),
                        }
                        .build()
                    })),
                    None => None,
                },
                Err(KeyValueStoreError::NotFound { .. }) => None,
                Err(KeyValueStoreError::ShuttingDown) => {
                    debug!(topic = %self.topic, "store shut down, closing subscription");
                    return;
                }
                Err(err) => Some(Err(err.into())),
            };

            match item {
                Some(item) => {
                    let is_err = item.is_err();
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return,
                        sent = sender.send(item) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                    if is_err {
                        warn!(topic = %self.topic, seq = cursor.seq(), "subscription stopped on read error");
                        return;
                    }
                    cursor = cursor.next();
                }
                None => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }
}
