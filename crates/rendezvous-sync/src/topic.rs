//! Typed topic and state names.
//!
//! A [`Topic<T>`] is a name plus the type of value it carries. Names are
//! dot-separated segments (e.g. `"bridge-descriptors"` or
//! `"peers.persistent"`) and form part of the wire contract between the
//! processes of a run, so they are validated before first use.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use crate::error::InvalidNameSnafu;
use crate::error::SyncError;

/// Maximum number of segments in a topic or state name.
pub const MAX_NAME_SEGMENTS: usize = 8;

/// Maximum length of a single name segment in bytes.
pub const MAX_SEGMENT_LENGTH: usize = 64;

/// Separator between name segments.
pub const NAME_SEGMENT_SEPARATOR: char = '.';

/// A named, typed, replayable broadcast channel.
///
/// The type parameter only fixes what publishers write and subscribers
/// decode; nothing about `T` is stored.
///
/// # Examples
///
/// ```
/// use rendezvous_sync::Topic;
///
/// const HEIGHTS: Topic<u64> = Topic::new("heights");
/// assert_eq!(HEIGHTS.name(), "heights");
/// assert!(HEIGHTS.validate().is_ok());
/// ```
pub struct Topic<T> {
    name: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Topic<T> {
    /// Topic with a static name, usable in `const` items.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _marker: PhantomData,
        }
    }

    /// Topic with a name built at runtime.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _marker: PhantomData,
        }
    }

    /// The topic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check the name against the naming rules.
    pub fn validate(&self) -> Result<(), SyncError> {
        validate_name(&self.name)
    }
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic").field("name", &self.name).finish()
    }
}

impl<T> fmt::Display for Topic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl<T> PartialEq for Topic<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for Topic<T> {}

/// Validate a topic or state name.
///
/// Names must be non-empty, have at most [`MAX_NAME_SEGMENTS`] segments of
/// at most [`MAX_SEGMENT_LENGTH`] bytes, and contain only alphanumeric
/// characters, hyphens and underscores within segments.
pub fn validate_name(name: &str) -> Result<(), SyncError> {
    if name.is_empty() {
        return InvalidNameSnafu {
            name,
            reason: "name is empty",
        }
        .fail();
    }

    let segments: Vec<&str> = name.split(NAME_SEGMENT_SEPARATOR).collect();
    if segments.len() > MAX_NAME_SEGMENTS {
        return InvalidNameSnafu {
            name,
            reason: format!("{} segments exceeds maximum of {MAX_NAME_SEGMENTS}", segments.len()),
        }
        .fail();
    }

    for (position, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return InvalidNameSnafu {
                name,
                reason: format!("segment {position} is empty"),
            }
            .fail();
        }
        if segment.len() > MAX_SEGMENT_LENGTH {
            return InvalidNameSnafu {
                name,
                reason: format!("segment '{segment}' is longer than {MAX_SEGMENT_LENGTH} bytes"),
            }
            .fail();
        }
        if let Some(ch) = segment.chars().find(|ch| !ch.is_ascii_alphanumeric() && *ch != '-' && *ch != '_') {
            return InvalidNameSnafu {
                name,
                reason: format!("invalid character '{ch}' in segment '{segment}'"),
            }
            .fail();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_name("genesis").is_ok());
        assert!(validate_name("bridge-descriptors").is_ok());
        assert!(validate_name("peers.persistent_v2").is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(validate_name(""), Err(SyncError::InvalidName { .. })));
    }

    #[test]
    fn test_empty_segment_rejected() {
        assert!(validate_name("a..b").is_err());
        assert!(validate_name(".a").is_err());
    }

    #[test]
    fn test_slash_rejected() {
        // Slashes would escape the key namespace.
        assert!(validate_name("a/b").is_err());
    }

    #[test]
    fn test_too_many_segments_rejected() {
        let name = vec!["s"; MAX_NAME_SEGMENTS + 1].join(".");
        assert!(validate_name(&name).is_err());
    }

    #[test]
    fn test_topic_equality_ignores_construction() {
        const STATIC: Topic<u32> = Topic::new("heights");
        let dynamic: Topic<u32> = Topic::named(String::from("heights"));
        assert_eq!(STATIC, dynamic);
        assert_eq!(dynamic.to_string(), "heights");
    }
}
