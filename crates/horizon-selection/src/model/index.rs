//! Plain index ranges handed out as selection snapshots.
//!
//! An [`IndexRange`] is the value form of a selection range: two inclusive
//! bounds over the item sequence at the time the snapshot was taken. It holds
//! no reference to the items themselves, so callers can keep it around without
//! pinning anything.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// An inclusive `[first_index, last_index]` interval of item positions.
///
/// Serialized with the field names `firstIndex` / `lastIndex`.
///
/// # Example
///
/// ```
/// use horizon_selection::model::IndexRange;
///
/// let range = IndexRange::new(2, 4);
/// assert_eq!(range.len(), 3);
/// assert!(range.contains(3));
/// assert_eq!(range.iter().collect::<Vec<_>>(), vec![2, 3, 4]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRange {
    /// The first index in the range (inclusive).
    pub first_index: usize,
    /// The last index in the range (inclusive).
    pub last_index: usize,
}

impl IndexRange {
    /// Creates a range from its inclusive bounds.
    ///
    /// The bounds are stored as given; use [`is_valid`](Self::is_valid) to
    /// check for a degenerate range.
    #[inline]
    pub const fn new(first_index: usize, last_index: usize) -> Self {
        Self {
            first_index,
            last_index,
        }
    }

    /// Creates a range covering a single index.
    #[inline]
    pub const fn single(index: usize) -> Self {
        Self::new(index, index)
    }

    /// Returns `true` if `first_index <= last_index`.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.first_index <= self.last_index
    }

    /// Number of indices covered, or 0 for a degenerate range.
    #[inline]
    pub const fn len(&self) -> usize {
        if self.is_valid() {
            self.last_index - self.first_index + 1
        } else {
            0
        }
    }

    /// Returns `true` for a degenerate range.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        !self.is_valid()
    }

    /// Returns `true` if `index` lies within the range.
    #[inline]
    pub const fn contains(&self, index: usize) -> bool {
        self.first_index <= index && index <= self.last_index
    }

    /// Iterates over every index in the range, ascending.
    pub fn iter(&self) -> RangeInclusive<usize> {
        self.first_index..=self.last_index
    }
}

impl From<RangeInclusive<usize>> for IndexRange {
    fn from(range: RangeInclusive<usize>) -> Self {
        Self::new(*range.start(), *range.end())
    }
}

impl From<IndexRange> for RangeInclusive<usize> {
    fn from(range: IndexRange) -> Self {
        range.first_index..=range.last_index
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.first_index, self.last_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single() {
        let range = IndexRange::single(7);
        assert_eq!(range.len(), 1);
        assert!(range.contains(7));
        assert!(!range.contains(8));
    }

    #[test]
    fn test_degenerate() {
        let range = IndexRange::new(5, 4);
        assert!(!range.is_valid());
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
    }

    #[test]
    fn test_from_range_inclusive() {
        let range: IndexRange = (3..=9).into();
        assert_eq!(range, IndexRange::new(3, 9));
        let back: RangeInclusive<usize> = range.into();
        assert_eq!(back, 3..=9);
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_string(&IndexRange::new(1, 5)).unwrap();
        assert_eq!(json, r#"{"firstIndex":1,"lastIndex":5}"#);

        let parsed: IndexRange = serde_json::from_str(r#"{"firstIndex":0,"lastIndex":2}"#).unwrap();
        assert_eq!(parsed, IndexRange::new(0, 2));
    }

    #[test]
    fn test_display() {
        assert_eq!(IndexRange::new(0, 25).to_string(), "[0, 25]");
    }
}
