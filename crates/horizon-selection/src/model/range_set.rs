//! Ordered set of inclusive index ranges.
//!
//! [`RangeSet`] is the storage behind every [`Selection`](super::Selection).
//! It keeps its ranges sorted by first index, pairwise disjoint and never
//! adjacent: adding `[5, 6]` to `{[2, 4], [7, 9]}` yields `{[2, 9]}`. The
//! invariant holds after every mutation, including the edit-reconciliation
//! primitives that shift ranges when items are inserted, removed or moved.
//!
//! A set may also be in the *everything* state: all current and future items
//! are selected. The concrete extent is only needed when the set has to be
//! expanded (snapshots, index lists, or a removal that narrows it).
//!
//! Each stored range may pin the items at its endpoints (see
//! [`RetainedItem`]). A single-index range pins its item once.

use std::collections::HashMap;

use horizon_selection_core::logging::targets;

use super::index::IndexRange;
use super::item::{Item, ItemHandle};
use super::retain::RetainedItem;
use crate::error::{SelectionError, SelectionResult};

/// A stored range together with its optional endpoint pins.
#[derive(Debug, Clone)]
pub struct PinnedRange {
    first_index: usize,
    last_index: usize,
    first_item: Option<RetainedItem>,
    /// Always `None` while `first_index == last_index`.
    last_item: Option<RetainedItem>,
}

impl PinnedRange {
    /// Creates an unpinned range.
    pub fn new(first_index: usize, last_index: usize) -> Self {
        Self {
            first_index,
            last_index,
            first_item: None,
            last_item: None,
        }
    }

    /// Pins the item at the first endpoint.
    pub fn with_first_item(mut self, item: RetainedItem) -> Self {
        self.first_item = Some(item);
        self.normalized()
    }

    /// Pins the item at the last endpoint.
    pub fn with_last_item(mut self, item: RetainedItem) -> Self {
        self.last_item = Some(item);
        self.normalized()
    }

    /// The first index (inclusive).
    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// The last index (inclusive).
    pub fn last_index(&self) -> usize {
        self.last_index
    }

    /// The item pinned at the first endpoint.
    pub fn first_item(&self) -> Option<&RetainedItem> {
        self.first_item.as_ref()
    }

    /// The item pinned at the last endpoint.
    ///
    /// For a single-index range this is the same pin as the first endpoint.
    pub fn last_item(&self) -> Option<&RetainedItem> {
        if self.is_single() {
            self.first_item.as_ref()
        } else {
            self.last_item.as_ref()
        }
    }

    /// The plain bounds of this range.
    pub fn as_index_range(&self) -> IndexRange {
        IndexRange::new(self.first_index, self.last_index)
    }

    /// Number of indices covered.
    pub fn len(&self) -> usize {
        self.last_index - self.first_index + 1
    }

    /// Always `false`; stored ranges are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn is_single(&self) -> bool {
        self.first_index == self.last_index
    }

    fn is_valid(&self) -> bool {
        self.first_index <= self.last_index
    }

    fn from_parts(
        first_index: usize,
        last_index: usize,
        first_item: Option<RetainedItem>,
        last_item: Option<RetainedItem>,
    ) -> Self {
        Self {
            first_index,
            last_index,
            first_item,
            last_item,
        }
        .normalized()
    }

    /// Applies the single-pin convention for single-index ranges.
    fn normalized(mut self) -> Self {
        if self.is_single() {
            if self.first_item.is_none() {
                self.first_item = self.last_item.take();
            } else {
                self.last_item = None;
            }
        }
        self
    }

    /// Splits into `(first pin, last pin)`; a single-index range yields its pin twice.
    fn into_endpoint_pins(self) -> (Option<RetainedItem>, Option<RetainedItem>) {
        if self.is_single() {
            let last = self.first_item.clone();
            (self.first_item, last)
        } else {
            (self.first_item, self.last_item)
        }
    }

    fn merge(self, other: Self) -> Self {
        let first_index = self.first_index.min(other.first_index);
        let last_index = self.last_index.max(other.last_index);
        let (a_first, b_first) = (self.first_index, other.first_index);
        let (a_last, b_last) = (self.last_index, other.last_index);
        let (a_first_pin, a_last_pin) = self.into_endpoint_pins();
        let (b_first_pin, b_last_pin) = other.into_endpoint_pins();

        let first_item = match a_first.cmp(&b_first) {
            std::cmp::Ordering::Less => a_first_pin,
            std::cmp::Ordering::Greater => b_first_pin,
            std::cmp::Ordering::Equal => a_first_pin.or(b_first_pin),
        };
        let last_item = match a_last.cmp(&b_last) {
            std::cmp::Ordering::Greater => a_last_pin,
            std::cmp::Ordering::Less => b_last_pin,
            std::cmp::Ordering::Equal => a_last_pin.or(b_last_pin),
        };
        Self::from_parts(first_index, last_index, first_item, last_item)
    }

    fn shift_up(&mut self) {
        self.first_index += 1;
        self.last_index += 1;
    }

    fn shift_down(&mut self) {
        self.first_index -= 1;
        self.last_index -= 1;
    }
}

impl From<IndexRange> for PinnedRange {
    fn from(range: IndexRange) -> Self {
        Self::new(range.first_index, range.last_index)
    }
}

impl From<std::ops::RangeInclusive<usize>> for PinnedRange {
    fn from(range: std::ops::RangeInclusive<usize>) -> Self {
        Self::new(*range.start(), *range.end())
    }
}

/// An endpoint pin reported by [`RangeSet::pinned_endpoints`].
#[derive(Debug, Clone)]
pub struct EndpointPin {
    /// Index the endpoint currently occupies.
    pub index: usize,
    /// The pinned item.
    pub item: Item,
}

/// Sorted, disjoint, non-adjacent set of index ranges.
///
/// # Example
///
/// ```
/// use horizon_selection::model::{IndexRange, RangeSet};
///
/// let mut set = RangeSet::new();
/// set.add(IndexRange::new(2, 4));
/// set.add(IndexRange::new(7, 9));
/// set.add(IndexRange::new(5, 6));
/// assert_eq!(set.ranges(), vec![IndexRange::new(2, 9)]);
///
/// set.remove(IndexRange::new(5, 6)).unwrap();
/// assert_eq!(set.ranges(), vec![IndexRange::new(2, 4), IndexRange::new(7, 9)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RangeSet {
    ranges: Vec<PinnedRange>,
    everything: bool,
    /// Last known item count, used for clamping and expanding `everything`.
    extent: Option<usize>,
}

impl RangeSet {
    /// Creates an empty set with an unknown extent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set over `count` items.
    pub fn with_extent(count: usize) -> Self {
        Self {
            extent: Some(count),
            ..Self::default()
        }
    }

    // =========================================================================
    // Extent
    // =========================================================================

    /// The last known item count.
    pub fn extent(&self) -> Option<usize> {
        self.extent
    }

    /// Records the item count, dropping or trimming ranges beyond it.
    pub fn set_extent(&mut self, extent: Option<usize>) {
        self.extent = extent;
        let Some(count) = extent else {
            return;
        };
        if self.everything {
            return;
        }
        self.ranges.retain(|r| r.first_index < count);
        if let Some(last) = self.ranges.last_mut()
            && last.last_index >= count
        {
            last.last_index = count - 1;
            last.last_item = None;
        }
        self.check_everything();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns `true` if every current and future item is selected.
    pub fn is_everything(&self) -> bool {
        self.everything
    }

    /// Returns `true` if nothing is selected.
    pub fn is_empty(&self) -> bool {
        if self.everything {
            self.extent == Some(0)
        } else {
            self.ranges.is_empty()
        }
    }

    /// Number of selected indices.
    ///
    /// In the everything state this is the known extent (0 if unknown).
    pub fn count(&self) -> usize {
        if self.everything {
            self.extent.unwrap_or(0)
        } else {
            self.ranges.iter().map(PinnedRange::len).sum()
        }
    }

    /// Membership test by binary search.
    pub fn contains(&self, index: usize) -> bool {
        if self.everything {
            return self.extent.is_none_or(|count| index < count);
        }
        let i = self.ranges.partition_point(|r| r.last_index < index);
        self.ranges
            .get(i)
            .is_some_and(|r| r.first_index <= index)
    }

    /// Snapshot of the stored ranges.
    ///
    /// In the everything state this is `[0, extent - 1]`, or empty when the
    /// extent is unknown or zero.
    pub fn ranges(&self) -> Vec<IndexRange> {
        if self.everything {
            return match self.extent {
                Some(count) if count > 0 => vec![IndexRange::new(0, count - 1)],
                _ => Vec::new(),
            };
        }
        self.ranges.iter().map(PinnedRange::as_index_range).collect()
    }

    /// Every selected index, ascending.
    ///
    /// Fails with [`SelectionError::CountUnresolved`] in the everything state
    /// while the extent is unknown.
    pub fn indices(&self) -> SelectionResult<Vec<usize>> {
        if self.everything && self.extent.is_none() {
            return Err(SelectionError::CountUnresolved);
        }
        Ok(self.ranges().iter().flat_map(IndexRange::iter).collect())
    }

    /// The stored ranges with their pins.
    pub fn pinned_ranges(&self) -> &[PinnedRange] {
        &self.ranges
    }

    /// Every endpoint that currently pins an item.
    pub fn pinned_endpoints(&self) -> Vec<EndpointPin> {
        let mut pins = Vec::new();
        for range in &self.ranges {
            if let Some(item) = &range.first_item {
                pins.push(EndpointPin {
                    index: range.first_index,
                    item: item.item().clone(),
                });
            }
            if let Some(item) = &range.last_item {
                pins.push(EndpointPin {
                    index: range.last_index,
                    item: item.item().clone(),
                });
            }
        }
        pins
    }

    /// Endpoint indices that have no pinned item.
    pub fn unpinned_endpoints(&self) -> Vec<usize> {
        let mut missing = Vec::new();
        for range in &self.ranges {
            if range.first_item.is_none() {
                missing.push(range.first_index);
            }
            if !range.is_single() && range.last_item.is_none() {
                missing.push(range.last_index);
            }
        }
        missing
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Adds a range, merging it with every range it overlaps or touches.
    ///
    /// Degenerate ranges are ignored. With a known extent the range is clamped
    /// to it; a range starting past the extent is ignored. If the result covers
    /// the whole extent the set switches to the everything state.
    pub fn add(&mut self, range: impl Into<PinnedRange>) {
        let mut range = range.into();
        if !range.is_valid() {
            tracing::debug!(
                target: targets::RANGE_SET,
                first = range.first_index,
                last = range.last_index,
                "ignoring degenerate range"
            );
            return;
        }
        if let Some(count) = self.extent {
            if range.first_index >= count {
                tracing::debug!(
                    target: targets::RANGE_SET,
                    first = range.first_index,
                    count,
                    "ignoring range past the end"
                );
                return;
            }
            if range.last_index >= count {
                range.last_index = count - 1;
                range.last_item = None;
                range = range.normalized();
            }
        }
        if self.everything {
            return;
        }

        let start = self
            .ranges
            .partition_point(|r| r.last_index.saturating_add(1) < range.first_index);
        let end = self
            .ranges
            .partition_point(|r| r.first_index <= range.last_index.saturating_add(1));

        let merged = self
            .ranges
            .drain(start..end)
            .fold(range, |acc, existing| acc.merge(existing));
        self.ranges.insert(start, merged);
        self.check_everything();
    }

    /// Removes a range, splitting stored ranges as needed.
    ///
    /// In the everything state the set is first expanded to `[0, extent - 1]`,
    /// which requires a known extent.
    pub fn remove(&mut self, range: impl Into<PinnedRange>) -> SelectionResult<()> {
        let range = range.into();
        if !range.is_valid() {
            return Ok(());
        }
        if self.everything {
            let count = self.extent.ok_or(SelectionError::CountUnresolved)?;
            self.everything = false;
            if count > 0 {
                self.ranges.push(PinnedRange::new(0, count - 1));
            }
        }

        let start = self
            .ranges
            .partition_point(|r| r.last_index < range.first_index);
        let end = self
            .ranges
            .partition_point(|r| r.first_index <= range.last_index);

        let mut pieces = Vec::new();
        for existing in self.ranges.drain(start..end).collect::<Vec<_>>() {
            let (first, last) = (existing.first_index, existing.last_index);
            let (first_pin, last_pin) = existing.into_endpoint_pins();
            if first < range.first_index {
                pieces.push(PinnedRange::from_parts(
                    first,
                    range.first_index - 1,
                    first_pin,
                    None,
                ));
            }
            if last > range.last_index {
                pieces.push(PinnedRange::from_parts(
                    range.last_index + 1,
                    last,
                    None,
                    last_pin,
                ));
            }
        }
        self.ranges.splice(start..start, pieces);
        Ok(())
    }

    /// Empties the set and leaves the everything state.
    pub fn clear(&mut self) {
        self.ranges.clear();
        self.everything = false;
    }

    /// Enters the everything state.
    pub fn select_all(&mut self) {
        self.ranges.clear();
        self.everything = true;
    }

    /// Keeps only the lowest selected index.
    ///
    /// The everything state collapses to index 0, or to nothing while the
    /// extent is unknown or zero.
    pub fn retain_lowest(&mut self) {
        if self.everything {
            self.everything = false;
            if self.extent.is_some_and(|count| count > 0) {
                self.ranges.push(PinnedRange::new(0, 0));
            }
            return;
        }
        self.ranges.truncate(1);
        if let Some(first) = self.ranges.first_mut()
            && !first.is_single()
        {
            first.last_index = first.first_index;
            first.last_item = None;
        }
    }

    /// Clears the set and forgets the extent.
    pub fn reset(&mut self) {
        self.clear();
        self.extent = None;
    }

    /// Removes every stored range, keeping their pins, for re-insertion.
    pub fn take_ranges(&mut self) -> Vec<PinnedRange> {
        std::mem::take(&mut self.ranges)
    }

    /// Pins `item` at the endpoint occupying `index`, if that endpoint is unpinned.
    ///
    /// Returns `true` if a pin was stored.
    pub fn pin(&mut self, index: usize, item: RetainedItem) -> bool {
        let i = self.ranges.partition_point(|r| r.last_index < index);
        let Some(range) = self.ranges.get_mut(i) else {
            return false;
        };
        if range.first_index == index && range.first_item.is_none() {
            range.first_item = Some(item);
            true
        } else if range.last_index == index && !range.is_single() && range.last_item.is_none() {
            range.last_item = Some(item);
            true
        } else {
            false
        }
    }

    // =========================================================================
    // Edit reconciliation
    // =========================================================================

    /// An item was inserted at `index`.
    ///
    /// Ranges at or after `index` shift up. A range the insertion falls strictly
    /// inside (`first < index <= last`) widens when `widen` is set and is split
    /// around the new index otherwise.
    pub fn on_inserted(&mut self, index: usize, widen: bool) {
        if let Some(count) = self.extent.as_mut() {
            *count += 1;
        }
        if self.everything {
            return;
        }

        let mut updated = Vec::with_capacity(self.ranges.len() + 1);
        for mut range in self.ranges.drain(..) {
            if range.first_index >= index {
                range.shift_up();
                updated.push(range);
            } else if range.last_index >= index {
                if widen {
                    range.last_index += 1;
                    updated.push(range);
                } else {
                    let (first, last) = (range.first_index, range.last_index);
                    let (first_pin, last_pin) = range.into_endpoint_pins();
                    updated.push(PinnedRange::from_parts(first, index - 1, first_pin, None));
                    updated.push(PinnedRange::from_parts(index + 1, last + 1, None, last_pin));
                }
            } else {
                updated.push(range);
            }
        }
        self.ranges = updated;
    }

    /// The item at `index` was removed.
    ///
    /// Later ranges shift down, a range containing `index` shrinks (and
    /// disappears if that was its only index), and ranges made adjacent by the
    /// removal are merged.
    pub fn on_removed(&mut self, index: usize) {
        if let Some(count) = self.extent.as_mut() {
            *count = count.saturating_sub(1);
        }
        if self.everything {
            return;
        }

        let mut updated: Vec<PinnedRange> = Vec::with_capacity(self.ranges.len());
        for mut range in self.ranges.drain(..) {
            if range.last_index < index {
                // untouched
            } else if range.first_index > index {
                range.shift_down();
            } else if range.is_single() {
                continue;
            } else {
                if index == range.first_index {
                    range.first_item = None;
                } else if index == range.last_index {
                    range.last_item = None;
                }
                range.last_index -= 1;
                range = range.normalized();
            }

            if updated
                .last()
                .is_some_and(|prev| prev.last_index + 1 >= range.first_index)
                && let Some(prev) = updated.pop()
            {
                range = prev.merge(range);
            }
            updated.push(range);
        }
        self.ranges = updated;
    }

    /// The item at `old_index` moved to `new_index`.
    ///
    /// Neighbouring ranges shift as for a removal followed by an insertion; the
    /// moved item keeps its own membership. `item` re-pins the moved item if it
    /// ends up as an endpoint.
    pub fn on_moved(&mut self, old_index: usize, new_index: usize, item: Option<RetainedItem>) {
        if self.everything {
            return;
        }
        let was_selected = self.contains(old_index);
        self.on_removed(old_index);
        self.on_inserted(new_index, false);
        if was_selected {
            let range = PinnedRange::new(new_index, new_index);
            match item {
                Some(item) => self.add(range.with_first_item(item)),
                None => self.add(range),
            }
        }
    }

    /// An item was replaced in place; endpoints pinning `old` now pin `new`.
    pub fn on_changed(&mut self, old: ItemHandle, new: &RetainedItem) {
        for range in &mut self.ranges {
            if range.first_item.as_ref().is_some_and(|p| p.handle() == old) {
                range.first_item = Some(new.clone());
            }
            if range.last_item.as_ref().is_some_and(|p| p.handle() == old) {
                range.last_item = Some(new.clone());
            }
        }
    }

    /// Moves ranges to the freshly resolved positions of their pinned items.
    ///
    /// `resolved` maps a pinned handle to its current index, or to `None` if
    /// the item no longer exists. An endpoint whose item is gone is unpinned;
    /// a range with only one resolved endpoint keeps its length. A range is
    /// dropped when its endpoints cross or when every pinned endpoint lost its
    /// item. Unpinned ranges keep their indices. Returns `true` if anything
    /// moved or was dropped.
    pub fn relocate(&mut self, resolved: &HashMap<ItemHandle, Option<usize>>) -> bool {
        if self.everything {
            return false;
        }
        let lookup = |pin: &Option<RetainedItem>| {
            pin.as_ref()
                .and_then(|pin| resolved.get(&pin.handle()).copied())
        };

        let mut moved = false;
        for range in self.take_ranges() {
            let span = range.last_index - range.first_index;
            let first = lookup(&range.first_item);
            let last = if range.is_single() {
                first
            } else {
                lookup(&range.last_item)
            };
            let (first_index, last_index) = match (first, last) {
                (Some(Some(f)), Some(Some(l))) => (f, l),
                (Some(Some(f)), _) => (f, f + span),
                (_, Some(Some(l))) => (l.saturating_sub(span), l),
                (None, None) => (range.first_index, range.last_index),
                _ => {
                    moved = true;
                    tracing::debug!(
                        target: targets::RANGE_SET,
                        first_index = range.first_index,
                        last_index = range.last_index,
                        "dropping range whose pinned items are gone"
                    );
                    continue;
                }
            };
            if first_index > last_index {
                moved = true;
                tracing::debug!(
                    target: targets::RANGE_SET,
                    first_index,
                    last_index,
                    "dropping range whose endpoints crossed"
                );
                continue;
            }
            moved |= first_index != range.first_index || last_index != range.last_index;

            let (first_pin, last_pin) = range.into_endpoint_pins();
            let first_pin = first_pin.filter(|_| !matches!(first, Some(None)));
            let last_pin = last_pin.filter(|_| !matches!(last, Some(None)));
            self.add(PinnedRange::from_parts(
                first_index,
                last_index,
                first_pin,
                last_pin,
            ));
        }
        moved
    }

    fn check_everything(&mut self) {
        let Some(count) = self.extent else {
            return;
        };
        let covers_all = count > 0
            && self.ranges.len() == 1
            && self.ranges[0].first_index == 0
            && self.ranges[0].last_index == count - 1;
        if covers_all {
            tracing::debug!(target: targets::RANGE_SET, count, "range set covers every item");
            self.select_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemRecord, RetainTable};
    use serde_json::Value;
    use std::sync::Arc;

    fn r(first: usize, last: usize) -> IndexRange {
        IndexRange::new(first, last)
    }

    fn assert_invariants(set: &RangeSet) {
        let ranges = set.ranges();
        for pair in ranges.windows(2) {
            assert!(
                pair[0].last_index + 1 < pair[1].first_index,
                "ranges {} and {} overlap or touch",
                pair[0],
                pair[1]
            );
        }
        let expected: usize = ranges.iter().map(IndexRange::len).sum();
        assert_eq!(set.count(), expected);
        let indices = set.indices().unwrap();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_add_merges_adjacent() {
        let mut set = RangeSet::new();
        set.add(r(2, 4));
        set.add(r(5, 6));
        assert_eq!(set.ranges(), vec![r(2, 6)]);
        assert_invariants(&set);
    }

    #[test]
    fn test_add_overlapping_prefix() {
        let mut set = RangeSet::new();
        set.add(r(2, 4));
        set.add(r(7, 9));
        set.add(r(1, 5));
        assert_eq!(set.ranges(), vec![r(1, 5), r(7, 9)]);
        assert_invariants(&set);
    }

    #[test]
    fn test_add_bridges_gap() {
        let mut set = RangeSet::new();
        set.add(r(2, 4));
        set.add(r(7, 9));
        set.add(r(5, 6));
        assert_eq!(set.ranges(), vec![r(2, 9)]);
        assert_eq!(set.count(), 8);
    }

    #[test]
    fn test_add_degenerate_ignored() {
        let mut set = RangeSet::new();
        set.add(r(5, 3));
        assert!(set.is_empty());
    }

    #[test]
    fn test_add_clamps_to_extent() {
        let mut set = RangeSet::with_extent(10);
        set.add(r(8, 20));
        assert_eq!(set.ranges(), vec![r(8, 9)]);

        set.add(r(12, 14));
        assert_eq!(set.ranges(), vec![r(8, 9)]);
    }

    #[test]
    fn test_add_full_extent_sets_everything() {
        let mut set = RangeSet::with_extent(5);
        set.add(r(0, 2));
        assert!(!set.is_everything());
        set.add(r(3, 4));
        assert!(set.is_everything());
        assert_eq!(set.ranges(), vec![r(0, 4)]);
    }

    #[test]
    fn test_remove_splits_interior() {
        let mut set = RangeSet::new();
        set.add(r(4, 7));
        set.remove(r(5, 6)).unwrap();
        assert_eq!(set.ranges(), vec![r(4, 4), r(7, 7)]);
        assert_invariants(&set);
    }

    #[test]
    fn test_remove_scattered_indices() {
        let mut set = RangeSet::new();
        set.add(r(0, 7));
        set.add(r(9, 10));
        for index in [3, 7, 9, 10] {
            set.remove(r(index, index)).unwrap();
        }
        assert_eq!(set.ranges(), vec![r(0, 2), r(4, 6)]);
        assert_invariants(&set);
    }

    #[test]
    fn test_add_then_remove_round_trip() {
        let mut set = RangeSet::new();
        set.add(r(3, 12));
        set.remove(r(3, 12)).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.count(), 0);
    }

    #[test]
    fn test_remove_spanning_multiple() {
        let mut set = RangeSet::new();
        set.add(r(0, 2));
        set.add(r(5, 8));
        set.add(r(11, 15));
        set.remove(r(2, 12)).unwrap();
        assert_eq!(set.ranges(), vec![r(0, 1), r(13, 15)]);
    }

    #[test]
    fn test_contains() {
        let mut set = RangeSet::new();
        set.add(r(2, 4));
        set.add(r(10, 10));
        assert!(!set.contains(1));
        assert!(set.contains(2));
        assert!(set.contains(4));
        assert!(!set.contains(5));
        assert!(set.contains(10));
        assert!(!set.contains(11));
    }

    #[test]
    fn test_everything_without_extent() {
        let mut set = RangeSet::new();
        set.select_all();
        assert!(set.is_everything());
        assert!(set.contains(1_000_000));
        assert_eq!(set.indices(), Err(SelectionError::CountUnresolved));
        assert_eq!(set.remove(r(1, 1)), Err(SelectionError::CountUnresolved));
    }

    #[test]
    fn test_everything_remove_materializes() {
        let mut set = RangeSet::with_extent(26);
        set.select_all();
        assert_eq!(set.ranges(), vec![r(0, 25)]);
        assert_eq!(set.count(), 26);

        set.remove(r(5, 5)).unwrap();
        assert!(!set.is_everything());
        assert_eq!(set.ranges(), vec![r(0, 4), r(6, 25)]);
    }

    #[test]
    fn test_everything_survives_inserts() {
        let mut set = RangeSet::with_extent(3);
        set.select_all();
        set.on_inserted(1, true);
        assert!(set.is_everything());
        assert_eq!(set.count(), 4);
        set.on_removed(0);
        assert!(set.is_everything());
        assert_eq!(set.count(), 3);
    }

    #[test]
    fn test_insert_shifts_and_widens() {
        let mut set = RangeSet::with_extent(100);
        set.add(r(0, 2));
        set.add(r(10, 10));
        set.add(r(97, 99));

        set.on_removed(7);
        assert_eq!(
            set.indices().unwrap(),
            vec![0, 1, 2, 9, 96, 97, 98]
        );

        set.on_inserted(7, true);
        assert_eq!(
            set.indices().unwrap(),
            vec![0, 1, 2, 10, 97, 98, 99]
        );
    }

    #[test]
    fn test_insert_inside_range_widens() {
        let mut set = RangeSet::new();
        set.add(r(2, 5));
        set.on_inserted(4, true);
        assert_eq!(set.ranges(), vec![r(2, 6)]);

        // At the first endpoint the range shifts instead.
        set.on_inserted(2, true);
        assert_eq!(set.ranges(), vec![r(3, 7)]);

        // Just past the last endpoint nothing changes.
        set.on_inserted(8, true);
        assert_eq!(set.ranges(), vec![r(3, 7)]);
    }

    #[test]
    fn test_insert_without_widen_splits() {
        let mut set = RangeSet::new();
        set.add(r(2, 5));
        set.on_inserted(4, false);
        assert_eq!(set.ranges(), vec![r(2, 3), r(5, 6)]);
    }

    #[test]
    fn test_remove_sole_index_collapses() {
        let mut set = RangeSet::new();
        set.add(r(3, 3));
        set.add(r(6, 8));
        set.on_removed(3);
        assert_eq!(set.ranges(), vec![r(5, 7)]);
    }

    #[test]
    fn test_removal_merges_neighbours() {
        let mut set = RangeSet::new();
        set.add(r(2, 4));
        set.add(r(6, 8));
        set.on_removed(5);
        assert_eq!(set.ranges(), vec![r(2, 7)]);
        assert_invariants(&set);
    }

    #[test]
    fn test_move_preserves_membership() {
        let mut set = RangeSet::with_extent(10);
        set.add(r(2, 2));
        set.add(r(5, 6));

        // Selected item 2 moves to 7: it stays selected at its new position.
        set.on_moved(2, 7, None);
        assert_eq!(set.ranges(), vec![r(4, 5), r(7, 7)]);

        // Unselected item 0 moves into the middle of [4, 5]: it stays unselected.
        set.on_moved(0, 4, None);
        assert_eq!(set.ranges(), vec![r(3, 3), r(5, 5), r(7, 7)]);
        assert_eq!(set.extent(), Some(10));
    }

    #[test]
    fn test_retain_lowest() {
        let mut set = RangeSet::new();
        set.add(r(3, 6));
        set.add(r(9, 9));
        set.retain_lowest();
        assert_eq!(set.ranges(), vec![r(3, 3)]);

        let mut all = RangeSet::with_extent(4);
        all.select_all();
        all.retain_lowest();
        assert!(!all.is_everything());
        assert_eq!(all.ranges(), vec![r(0, 0)]);
    }

    #[test]
    fn test_set_extent_trims() {
        let mut set = RangeSet::new();
        set.add(r(1, 3));
        set.add(r(8, 12));
        set.add(r(20, 22));
        set.set_extent(Some(10));
        assert_eq!(set.ranges(), vec![r(1, 3), r(8, 9)]);
    }

    #[test]
    fn test_pins_follow_merges_and_splits() {
        let table = RetainTable::new();
        let items: Vec<Item> = (0..10)
            .map(|i| Arc::new(ItemRecord::new(format!("k{i}"), Value::Null)))
            .collect();
        let pinned = |first: usize, last: usize| {
            PinnedRange::new(first, last)
                .with_first_item(table.retain(items[first].clone()))
                .with_last_item(table.retain(items[last].clone()))
        };

        let mut set = RangeSet::new();
        set.add(pinned(4, 4));
        assert_eq!(table.total(), 1, "single-index ranges pin once");

        set.add(pinned(1, 2));
        set.add(pinned(6, 8));
        assert_eq!(table.total(), 5);

        // [1,2] + [3,3] + [4,4] merge into [1,4]: only 1 and 4 stay pinned.
        set.add(pinned(3, 3));
        assert_eq!(set.ranges(), vec![r(1, 4), r(6, 8)]);
        assert_eq!(table.total(), 4);
        assert_eq!(table.count(items[1].handle), 1);
        assert_eq!(table.count(items[4].handle), 1);

        // Splitting leaves new inner endpoints unpinned.
        set.remove(r(2, 3)).unwrap();
        assert_eq!(set.ranges(), vec![r(1, 1), r(4, 4), r(6, 8)]);
        assert_eq!(set.unpinned_endpoints(), Vec::<usize>::new());
        assert_eq!(table.total(), set.pinned_endpoints().len());

        set.clear();
        assert_eq!(table.total(), 0);

        // Cutting out the middle leaves the new inner endpoints unpinned.
        set.add(pinned(0, 9));
        set.remove(r(4, 5)).unwrap();
        assert_eq!(set.ranges(), vec![r(0, 3), r(6, 9)]);
        assert_eq!(set.unpinned_endpoints(), vec![3, 6]);
        assert_eq!(table.total(), 2);
    }

    #[test]
    fn test_relocate_follows_pins() {
        let table = RetainTable::new();
        let items: Vec<Item> = (0..6)
            .map(|i| Arc::new(ItemRecord::new(format!("k{i}"), Value::Null)))
            .collect();

        let mut set = RangeSet::new();
        set.add(
            PinnedRange::new(1, 2)
                .with_first_item(table.retain(items[1].clone()))
                .with_last_item(table.retain(items[2].clone())),
        );
        set.add(PinnedRange::new(5, 5).with_first_item(table.retain(items[5].clone())));

        // k1 and k2 drifted up by two; k5 is gone.
        let mut resolved = HashMap::new();
        resolved.insert(items[1].handle, Some(3));
        resolved.insert(items[2].handle, Some(4));
        resolved.insert(items[5].handle, None);

        assert!(set.relocate(&resolved));
        assert_eq!(set.ranges(), vec![r(3, 4)]);
        assert_eq!(table.count(items[5].handle), 0);
        assert_eq!(table.total(), 2);
    }

    #[test]
    fn test_relocate_drops_range_whose_items_vanished() {
        let table = RetainTable::new();
        let gone = Arc::new(ItemRecord::new("c", Value::Null));
        let first = Arc::new(ItemRecord::new("p", Value::Null));
        let last = Arc::new(ItemRecord::new("q", Value::Null));

        let mut set = RangeSet::new();
        set.add(PinnedRange::new(2, 2).with_first_item(table.retain(gone.clone())));
        set.add(
            PinnedRange::new(8, 9)
                .with_first_item(table.retain(first.clone()))
                .with_last_item(table.retain(last.clone())),
        );
        set.add(r(14, 15));

        let mut resolved = HashMap::new();
        resolved.insert(gone.handle, None);
        resolved.insert(first.handle, None);
        resolved.insert(last.handle, None);

        assert!(set.relocate(&resolved));
        assert_eq!(set.ranges(), vec![r(14, 15)]);
        assert_eq!(table.total(), 0);
    }

    #[test]
    fn test_changed_repins() {
        let table = RetainTable::new();
        let old = Arc::new(ItemRecord::new("a", Value::Null));
        let new = Arc::new(ItemRecord::new("a", Value::from(1)));

        let mut set = RangeSet::new();
        set.add(PinnedRange::new(0, 0).with_first_item(table.retain(old.clone())));
        let replacement = table.retain(new.clone());
        set.on_changed(old.handle, &replacement);
        drop(replacement);

        assert_eq!(table.count(old.handle), 0);
        assert_eq!(table.count(new.handle), 1);
    }
}
