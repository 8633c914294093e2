//! Key-value operation types.
//!
//! The coordination layers only need three mutations: plain set,
//! compare-and-swap and delete. Values are strings (JSON documents in
//! practice) so any backend can store them without a codec of its own.

use serde::Deserialize;
use serde::Serialize;

use crate::constants::MAX_KEY_SIZE;
use crate::constants::MAX_VALUE_SIZE;
use crate::error::KeyValueStoreError;

/// Commands for modifying key-value state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WriteCommand {
    /// Set a single key-value pair unconditionally.
    Set { key: String, value: String },
    /// Compare-and-swap: atomically update value if current value matches expected.
    ///
    /// `expected: None` means the key must not exist yet.
    CompareAndSwap {
        key: String,
        expected: Option<String>,
        new_value: String,
    },
    /// Delete a single key.
    Delete { key: String },
}

impl WriteCommand {
    /// The key this command touches.
    pub fn key(&self) -> &str {
        match self {
            WriteCommand::Set { key, .. } | WriteCommand::CompareAndSwap { key, .. } | WriteCommand::Delete { key } => {
                key
            }
        }
    }
}

/// Key-value pair with revision metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValueWithRevision {
    /// The key identifying this entry.
    pub key: String,
    /// The stored value.
    pub value: String,
    /// Key-specific version number, starting at 1 and incremented on each write to this key.
    pub version: u64,
    /// Store revision at which the key was first created.
    pub create_revision: u64,
    /// Store revision of the most recent modification to this key.
    pub mod_revision: u64,
}

/// Request to perform a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteRequest {
    pub command: WriteCommand,
}

impl WriteRequest {
    /// Create a Set command to store a key-value pair.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Set {
                key: key.into(),
                value: value.into(),
            },
        }
    }

    /// Create a CompareAndSwap command.
    pub fn compare_and_swap(key: impl Into<String>, expected: Option<String>, new_value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::CompareAndSwap {
                key: key.into(),
                expected,
                new_value: new_value.into(),
            },
        }
    }

    /// Create a Delete command.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Delete { key: key.into() },
        }
    }
}

/// Result of a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteResult {
    /// Store revision assigned to this write.
    pub revision: u64,
}

/// Request to read a single key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadRequest {
    pub key: String,
}

impl ReadRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Result of a read; `kv` is `None` when the key does not exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadResult {
    pub kv: Option<KeyValueWithRevision>,
}

/// Request to delete a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: String,
}

impl DeleteRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResult {
    pub key: String,
    /// True if the key existed and was deleted.
    pub is_deleted: bool,
}

/// Request to scan keys with a given prefix, in key order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRequest {
    pub prefix: String,
    pub limit: Option<u32>,
    /// Exclusive lower bound: resume after this key.
    pub continuation_token: Option<String>,
}

impl ScanRequest {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            limit: None,
            continuation_token: None,
        }
    }
}

/// Response from a scan operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResult {
    pub entries: Vec<KeyValueWithRevision>,
    pub is_truncated: bool,
    /// Pass back as `continuation_token` to fetch the next page.
    pub continuation_token: Option<String>,
}

/// Validate a write command against fixed size limits.
pub fn validate_write_command(command: &WriteCommand) -> Result<(), KeyValueStoreError> {
    let check_key = |key: &str| {
        if key.is_empty() {
            return Err(KeyValueStoreError::EmptyKey);
        }
        let len = key.len();
        if len > MAX_KEY_SIZE as usize {
            Err(KeyValueStoreError::KeyTooLarge {
                size: len as u32,
                max: MAX_KEY_SIZE,
            })
        } else {
            Ok(())
        }
    };

    let check_value = |value: &str| {
        let len = value.len();
        if len > MAX_VALUE_SIZE as usize {
            Err(KeyValueStoreError::ValueTooLarge {
                size: len.min(u32::MAX as usize) as u32,
                max: MAX_VALUE_SIZE,
            })
        } else {
            Ok(())
        }
    };

    match command {
        WriteCommand::Set { key, value } => {
            check_key(key)?;
            check_value(value)?;
        }
        WriteCommand::CompareAndSwap { key, new_value, .. } => {
            check_key(key)?;
            check_value(new_value)?;
        }
        WriteCommand::Delete { key } => {
            check_key(key)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        let result = validate_write_command(&WriteRequest::set("", "v").command);
        assert_eq!(result, Err(KeyValueStoreError::EmptyKey));
    }

    #[test]
    fn oversized_key_is_rejected() {
        let key = "k".repeat(MAX_KEY_SIZE as usize + 1);
        let result = validate_write_command(&WriteRequest::delete(key).command);
        assert!(matches!(result, Err(KeyValueStoreError::KeyTooLarge { .. })));
    }

    #[test]
    fn oversized_cas_value_is_rejected() {
        let value = "v".repeat(MAX_VALUE_SIZE as usize + 1);
        let result = validate_write_command(&WriteRequest::compare_and_swap("k", None, value).command);
        assert!(matches!(result, Err(KeyValueStoreError::ValueTooLarge { .. })));
    }

    #[test]
    fn command_key_accessor() {
        assert_eq!(WriteRequest::set("a", "1").command.key(), "a");
        assert_eq!(WriteRequest::compare_and_swap("b", None, "1").command.key(), "b");
        assert_eq!(WriteRequest::delete("c").command.key(), "c");
    }

    #[test]
    fn write_request_serializes_as_json() {
        let request = WriteRequest::compare_and_swap("k", Some("1".into()), "2");
        let json = serde_json::to_string(&request).unwrap();
        let decoded: WriteRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, request);
    }
}
