//! Deterministic in-memory key-value store.
//!
//! Hosts every topic and barrier of a run inside one process. Used by the
//! local network harness and by tests across the workspace.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::constants::DEFAULT_SCAN_LIMIT;
use crate::constants::MAX_SCAN_RESULTS;
use crate::error::KeyValueStoreError;
use crate::kv::DeleteRequest;
use crate::kv::DeleteResult;
use crate::kv::KeyValueWithRevision;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::ScanRequest;
use crate::kv::ScanResult;
use crate::kv::WriteCommand;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;
use crate::kv::validate_write_command;
use crate::traits::KeyValueStore;

/// Versioned value for tracking revisions.
#[derive(Clone)]
struct VersionedValue {
    value: String,
    version: u64,
    create_revision: u64,
    mod_revision: u64,
}

impl VersionedValue {
    fn to_kv(&self, key: &str) -> KeyValueWithRevision {
        KeyValueWithRevision {
            key: key.to_string(),
            value: self.value.clone(),
            version: self.version,
            create_revision: self.create_revision,
            mod_revision: self.mod_revision,
        }
    }
}

#[derive(Default)]
struct StoreState {
    data: BTreeMap<String, VersionedValue>,
    revision: u64,
}

impl StoreState {
    fn put(&mut self, key: &str, value: String) -> u64 {
        self.revision += 1;
        let revision = self.revision;
        match self.data.get_mut(key) {
            Some(existing) => {
                existing.value = value;
                existing.version += 1;
                existing.mod_revision = revision;
            }
            None => {
                self.data.insert(key.to_string(), VersionedValue {
                    value,
                    version: 1,
                    create_revision: revision,
                    mod_revision: revision,
                });
            }
        }
        revision
    }
}

/// A deterministic in-memory key-value store.
///
/// All operations on one store are linearizable: a single lock guards the
/// data and the revision counter, so compare-and-swap is atomic.
#[derive(Default)]
pub struct DeterministicKeyValueStore {
    state: RwLock<StoreState>,
    is_shut_down: AtomicBool,
}

impl DeterministicKeyValueStore {
    /// Create a new deterministic store wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuse all further operations with [`KeyValueStoreError::ShuttingDown`].
    ///
    /// Models the rendezvous service going away mid-run.
    pub fn shutdown(&self) {
        self.is_shut_down.store(true, Ordering::SeqCst);
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.state.read().await.data.len()
    }

    /// Returns true if no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.data.is_empty()
    }

    fn ensure_running(&self) -> Result<(), KeyValueStoreError> {
        if self.is_shut_down.load(Ordering::SeqCst) {
            return Err(KeyValueStoreError::ShuttingDown);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for DeterministicKeyValueStore {
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        self.ensure_running()?;
        validate_write_command(&request.command)?;

        let mut state = self.state.write().await;
        let revision = match request.command {
            WriteCommand::Set { key, value } => state.put(&key, value),
            WriteCommand::CompareAndSwap {
                key,
                expected,
                new_value,
            } => {
                let current = state.data.get(&key).map(|v| v.value.clone());
                if current != expected {
                    trace!(key, "compare-and-swap conflict");
                    return Err(KeyValueStoreError::CompareAndSwapFailed {
                        key,
                        expected,
                        actual: current,
                    });
                }
                state.put(&key, new_value)
            }
            WriteCommand::Delete { key } => {
                state.data.remove(&key);
                state.revision += 1;
                state.revision
            }
        };

        Ok(WriteResult { revision })
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        self.ensure_running()?;
        let state = self.state.read().await;
        Ok(ReadResult {
            kv: state.data.get(&request.key).map(|v| v.to_kv(&request.key)),
        })
    }

    async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult, KeyValueStoreError> {
        self.ensure_running()?;
        let mut state = self.state.write().await;
        let is_deleted = state.data.remove(&request.key).is_some();
        if is_deleted {
            state.revision += 1;
        }
        Ok(DeleteResult {
            key: request.key,
            is_deleted,
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        self.ensure_running()?;
        let state = self.state.read().await;

        let limit = request.limit.unwrap_or(DEFAULT_SCAN_LIMIT).min(MAX_SCAN_RESULTS) as usize;
        let lower = match &request.continuation_token {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Included(request.prefix.clone()),
        };

        let mut entries: Vec<KeyValueWithRevision> = state
            .data
            .range((lower, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(&request.prefix))
            .take(limit + 1)
            .map(|(k, v)| v.to_kv(k))
            .collect();

        let is_truncated = entries.len() > limit;
        entries.truncate(limit);
        let continuation_token = if is_truncated {
            entries.last().map(|kv| kv.key.clone())
        } else {
            None
        };

        Ok(ScanResult {
            entries,
            is_truncated,
            continuation_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_read() {
        let store = DeterministicKeyValueStore::new();
        store.write(WriteRequest::set("a", "1")).await.unwrap();

        let result = store.read(ReadRequest::new("a")).await.unwrap();
        let kv = result.kv.unwrap();
        assert_eq!(kv.value, "1");
        assert_eq!(kv.version, 1);
        assert_eq!(kv.create_revision, kv.mod_revision);
    }

    #[tokio::test]
    async fn test_read_missing_key_is_none() {
        let store = DeterministicKeyValueStore::new();
        let result = store.read(ReadRequest::new("missing")).await.unwrap();
        assert!(result.kv.is_none());
    }

    #[tokio::test]
    async fn test_cas_create_only_once() {
        let store = DeterministicKeyValueStore::new();
        store.write(WriteRequest::compare_and_swap("k", None, "first")).await.unwrap();

        let err = store.write(WriteRequest::compare_and_swap("k", None, "second")).await.unwrap_err();
        match err {
            KeyValueStoreError::CompareAndSwapFailed { actual, .. } => assert_eq!(actual.as_deref(), Some("first")),
            other => panic!("expected CAS failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cas_update_bumps_version() {
        let store = DeterministicKeyValueStore::new();
        store.write(WriteRequest::set("k", "1")).await.unwrap();
        store.write(WriteRequest::compare_and_swap("k", Some("1".into()), "2")).await.unwrap();

        let kv = store.read(ReadRequest::new("k")).await.unwrap().kv.unwrap();
        assert_eq!(kv.value, "2");
        assert_eq!(kv.version, 2);
        assert!(kv.mod_revision > kv.create_revision);
    }

    #[tokio::test]
    async fn test_scan_prefix_in_key_order_with_pagination() {
        let store = DeterministicKeyValueStore::new();
        for i in [3, 1, 2, 5, 4] {
            store.write(WriteRequest::set(format!("p/{i}"), i.to_string())).await.unwrap();
        }
        store.write(WriteRequest::set("q/1", "x")).await.unwrap();

        let first = store
            .scan(ScanRequest {
                prefix: "p/".into(),
                limit: Some(2),
                continuation_token: None,
            })
            .await
            .unwrap();
        let keys: Vec<_> = first.entries.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["p/1", "p/2"]);
        assert!(first.is_truncated);

        let rest = store
            .scan(ScanRequest {
                prefix: "p/".into(),
                limit: Some(10),
                continuation_token: first.continuation_token,
            })
            .await
            .unwrap();
        let keys: Vec<_> = rest.entries.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["p/3", "p/4", "p/5"]);
        assert!(!rest.is_truncated);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = DeterministicKeyValueStore::new();
        store.write(WriteRequest::set("k", "v")).await.unwrap();
        assert!(store.delete(DeleteRequest::new("k")).await.unwrap().is_deleted);
        assert!(!store.delete(DeleteRequest::new("k")).await.unwrap().is_deleted);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_operations() {
        let store = DeterministicKeyValueStore::new();
        store.shutdown();
        let err = store.read(ReadRequest::new("k")).await.unwrap_err();
        assert_eq!(err, KeyValueStoreError::ShuttingDown);
    }
}
