//! Error types for key-value store operations.

use snafu::Snafu;

/// Boxed error returned by external collaborators (node drivers, chain tooling).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by a [`crate::KeyValueStore`].
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum KeyValueStoreError {
    /// The key does not exist.
    #[snafu(display("key '{key}' not found"))]
    NotFound { key: String },

    /// A compare-and-swap found a different value than expected.
    #[snafu(display("compare-and-swap failed for key '{key}': expected {expected:?}, found {actual:?}"))]
    CompareAndSwapFailed {
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// Keys must be non-empty.
    #[snafu(display("key must not be empty"))]
    EmptyKey,

    /// Key exceeds [`crate::MAX_KEY_SIZE`].
    #[snafu(display("key size {size} exceeds maximum of {max} bytes"))]
    KeyTooLarge { size: u32, max: u32 },

    /// Value exceeds [`crate::MAX_VALUE_SIZE`].
    #[snafu(display("value size {size} exceeds maximum of {max} bytes"))]
    ValueTooLarge { size: u32, max: u32 },

    /// The backend is shutting down and refuses new operations.
    #[snafu(display("store is shutting down"))]
    ShuttingDown,

    /// Any other backend failure.
    #[snafu(display("operation failed: {reason}"))]
    Failed { reason: String },
}

impl KeyValueStoreError {
    /// Returns true for a compare-and-swap conflict, which callers retry.
    pub fn is_cas_conflict(&self) -> bool {
        matches!(self, KeyValueStoreError::CompareAndSwapFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_failed_display_names_key() {
        let err = KeyValueStoreError::CompareAndSwapFailed {
            key: "__sync/run/state/genesis-ready".to_string(),
            expected: Some("1".to_string()),
            actual: Some("2".to_string()),
        };
        assert!(err.to_string().contains("__sync/run/state/genesis-ready"));
        assert!(err.is_cas_conflict());
    }

    #[test]
    fn other_errors_are_not_conflicts() {
        assert!(!KeyValueStoreError::EmptyKey.is_cas_conflict());
        assert!(!KeyValueStoreError::ShuttingDown.is_cas_conflict());
        assert_eq!(KeyValueStoreError::KeyTooLarge { size: 2000, max: 1024 }.to_string(), "key size 2000 exceeds maximum of 1024 bytes");
    }
}
