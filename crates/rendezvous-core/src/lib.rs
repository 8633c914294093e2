//! Core types and traits for rendezvous coordination.
//!
//! This crate provides the foundation every other rendezvous crate builds on:
//!
//! - **Traits**: [`KeyValueStore`], the linearizable store that hosts a run's
//!   topics and barriers
//! - **Types**: [`WriteCommand`], [`ReadRequest`], [`ScanRequest`], etc.
//! - **Backends**: [`inmemory::DeterministicKeyValueStore`] for single-process
//!   runs and tests
//! - **Deadlines**: [`RunDeadline`], the bounded context every blocking wait
//!   races against
//! - **Constants**: fixed resource limits and polling defaults
//!
//! Any store offering compare-and-swap can host a run. The coordination
//! layers never assume the store is local.

pub mod constants;
pub mod deadline;
pub mod error;
pub mod inmemory;
pub mod kv;
pub mod traits;
pub mod utils;

pub use constants::CAS_RETRY_INITIAL_BACKOFF_MS;
pub use constants::CAS_RETRY_MAX_BACKOFF_MS;
pub use constants::DEFAULT_POLL_INTERVAL_MS;
pub use constants::DEFAULT_SCAN_LIMIT;
pub use constants::MAX_CAS_RETRIES;
pub use constants::MAX_KEY_SIZE;
pub use constants::MAX_SCAN_RESULTS;
pub use constants::MAX_VALUE_SIZE;
pub use deadline::DeadlineError;
pub use deadline::RunDeadline;
pub use error::BoxError;
pub use error::KeyValueStoreError;
pub use inmemory::DeterministicKeyValueStore;
pub use kv::DeleteRequest;
pub use kv::DeleteResult;
pub use kv::KeyValueWithRevision;
pub use kv::ReadRequest;
pub use kv::ReadResult;
pub use kv::ScanRequest;
pub use kv::ScanResult;
pub use kv::WriteCommand;
pub use kv::WriteRequest;
pub use kv::WriteResult;
pub use kv::validate_write_command;
pub use traits::KeyValueStore;
pub use utils::now_unix_ms;
