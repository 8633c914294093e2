//! Per-subscription read position in a topic log.

use serde::Deserialize;
use serde::Serialize;

/// Position of the next entry a subscription reads.
///
/// Topic sequence numbers are 1-based, so [`Cursor::FIRST`] replays a topic
/// from its first publication. Cursors are local to one subscription; two
/// subscribers of the same topic never share one.
///
/// # Examples
///
/// ```
/// use rendezvous_sync::Cursor;
///
/// let cursor = Cursor::FIRST;
/// assert_eq!(cursor.seq(), 1);
/// assert_eq!(cursor.next().seq(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cursor(u64);

impl Cursor {
    /// Cursor at the first entry of a topic.
    pub const FIRST: Cursor = Cursor(1);

    /// Cursor at a specific sequence number.
    ///
    /// Sequence 0 does not exist and is treated as [`Cursor::FIRST`].
    #[inline]
    pub const fn at(seq: u64) -> Self {
        if seq == 0 { Cursor::FIRST } else { Cursor(seq) }
    }

    /// Sequence number this cursor reads next.
    #[inline]
    pub const fn seq(&self) -> u64 {
        self.0
    }

    /// Cursor after this one. Saturates at `u64::MAX`.
    #[inline]
    pub const fn next(&self) -> Self {
        Cursor(self.0.saturating_add(1))
    }

    /// Number of entries this cursor has already passed.
    #[inline]
    pub const fn consumed(&self) -> u64 {
        self.0.saturating_sub(1)
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::FIRST
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_maps_to_first() {
        assert_eq!(Cursor::at(0), Cursor::FIRST);
        assert_eq!(Cursor::default(), Cursor::FIRST);
    }

    #[test]
    fn test_next_and_consumed() {
        let cursor = Cursor::at(5);
        assert_eq!(cursor.next().seq(), 6);
        assert_eq!(cursor.consumed(), 4);
        assert_eq!(Cursor::FIRST.consumed(), 0);
        assert_eq!(Cursor::at(u64::MAX).next().seq(), u64::MAX);
    }

    #[test]
    fn test_ordering() {
        assert!(Cursor::FIRST < Cursor::at(2));
    }
}
