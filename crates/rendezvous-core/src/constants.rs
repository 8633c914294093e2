//! Fixed limits and defaults for rendezvous coordination.
//!
//! Every constant bounds a resource: key and value sizes, scan results, CAS
//! retries and poll cadence. Nothing here is configurable at runtime.

// ============================================================================
// Key-Value Size Limits
// ============================================================================

/// Maximum size of a single key in bytes (1 KB).
pub const MAX_KEY_SIZE: u32 = 1024;

/// Maximum size of a single value in bytes (1 MB).
///
/// Genesis bundles are the largest values a run stores.
pub const MAX_VALUE_SIZE: u32 = 1024 * 1024;

/// Maximum number of keys that can be returned in a single scan.
pub const MAX_SCAN_RESULTS: u32 = 10_000;

/// Default number of keys returned in a scan if limit is not specified.
pub const DEFAULT_SCAN_LIMIT: u32 = 1_000;

// ============================================================================
// CAS Retry
// ============================================================================

/// Maximum CAS attempts before an operation gives up.
pub const MAX_CAS_RETRIES: u32 = 100;

/// Initial backoff between CAS attempts in milliseconds.
pub const CAS_RETRY_INITIAL_BACKOFF_MS: u64 = 1;

/// Upper bound on CAS backoff in milliseconds.
pub const CAS_RETRY_MAX_BACKOFF_MS: u64 = 128;

// ============================================================================
// Polling
// ============================================================================

/// Default interval between polls of a topic log or barrier state.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 25;

/// Lower bound for a configured poll interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 1;

/// Upper bound for a configured poll interval.
pub const MAX_POLL_INTERVAL_MS: u64 = 5_000;

/// Maximum entries a publisher tries past its head hint before giving up.
///
/// A publisher whose hint lags this far behind the real head is racing an
/// unbounded number of concurrent publishers.
pub const MAX_PUBLISH_ATTEMPTS: u32 = 100_000;
