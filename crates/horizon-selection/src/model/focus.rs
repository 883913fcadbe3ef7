//! Keyboard focus tracking.
//!
//! Focus is independent of selection, but it follows the same index shifts
//! when items are inserted, removed or moved. [`GroupFocusCache`] remembers
//! the last focused item of each group so that keyboard navigation into a
//! group can return to it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use horizon_selection_core::logging::targets;

/// What kind of entry holds focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusKind {
    /// An item, addressed by item index.
    #[default]
    Item,
    /// A group header, addressed by group index.
    GroupHeader,
}

/// The focused entry. Defaults to the first item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FocusedItem {
    /// Kind of the focused entry.
    #[serde(rename = "type")]
    pub kind: FocusKind,
    /// Index of the focused entry.
    pub index: usize,
}

impl FocusedItem {
    /// Focus on the item at `index`.
    pub const fn item(index: usize) -> Self {
        Self {
            kind: FocusKind::Item,
            index,
        }
    }

    /// Focus on the header of group `index`.
    pub const fn group_header(index: usize) -> Self {
        Self {
            kind: FocusKind::GroupHeader,
            index,
        }
    }

    /// Returns `true` if an item (not a header) holds focus.
    pub fn is_item(&self) -> bool {
        self.kind == FocusKind::Item
    }

    /// An item was inserted at `index`.
    pub(crate) fn on_inserted(&mut self, index: usize) {
        if self.is_item() && index <= self.index {
            self.index += 1;
        }
    }

    /// The item at `index` was removed; `remaining` items are left.
    ///
    /// Removing the focused item leaves focus on whatever now occupies its
    /// index, clamped to the last item.
    pub(crate) fn on_removed(&mut self, index: usize, remaining: Option<usize>) {
        if !self.is_item() {
            return;
        }
        if index < self.index {
            self.index -= 1;
        } else if index == self.index
            && let Some(remaining) = remaining
        {
            self.index = self.index.min(remaining.saturating_sub(1));
        }
    }

    /// The item count is now `count`; focus past the end moves to the last item.
    pub(crate) fn clamp_to(&mut self, count: usize) {
        if self.is_item() && self.index >= count {
            self.index = count.saturating_sub(1);
        }
    }

    /// The item at `old_index` moved to `new_index`.
    pub(crate) fn on_moved(&mut self, old_index: usize, new_index: usize) {
        if !self.is_item() {
            return;
        }
        if self.index == old_index {
            self.index = new_index;
            return;
        }
        if old_index < self.index {
            self.index -= 1;
        }
        if new_index <= self.index {
            self.index += 1;
        }
    }
}

/// Remembers the last focused item of every group.
///
/// Two maps are kept: group key to item key, and item key to item index.
/// Indices are updated as items move; a group whose remembered item is gone
/// falls back to its first item.
///
/// # Example
///
/// ```
/// use horizon_selection::model::GroupFocusCache;
///
/// let mut cache = GroupFocusCache::new();
/// cache.update_cache("fruit", "pear", 7);
/// assert_eq!(cache.index_for_group("fruit", 4), 7);
/// assert_eq!(cache.index_for_group("veg", 12), 12);
///
/// cache.delete_item("pear");
/// assert_eq!(cache.index_for_group("fruit", 4), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GroupFocusCache {
    group_to_item: HashMap<String, String>,
    item_to_index: HashMap<String, usize>,
    last_focused_item_key: Option<String>,
    last_focused_item_index: usize,
}

impl GroupFocusCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `item_key` at `item_index` was focused inside `group_key`.
    pub fn update_cache(&mut self, group_key: &str, item_key: &str, item_index: usize) {
        self.last_focused_item_key = Some(item_key.to_owned());
        self.last_focused_item_index = item_index;
        self.item_to_index.insert(item_key.to_owned(), item_index);
        self.group_to_item
            .insert(group_key.to_owned(), item_key.to_owned());
    }

    /// Forgets `item_key` and the group entry pointing at it.
    pub fn delete_item(&mut self, item_key: &str) {
        if self.last_focused_item_key.as_deref() == Some(item_key) {
            self.last_focused_item_key = None;
            self.last_focused_item_index = 0;
        }
        if self.item_to_index.remove(item_key).is_none() {
            return;
        }
        self.group_to_item.retain(|_, item| item != item_key);
        tracing::trace!(target: targets::FOCUS, item_key, "dropped cached focus item");
    }

    /// Forgets `group_key` and its remembered item.
    pub fn delete_group(&mut self, group_key: &str) {
        if let Some(item_key) = self.group_to_item.remove(group_key) {
            self.item_to_index.remove(&item_key);
        }
    }

    /// Records the new index of `item_key`.
    pub fn update_item_index(&mut self, item_key: &str, item_index: usize) {
        if self.last_focused_item_key.as_deref() == Some(item_key) {
            self.last_focused_item_index = item_index;
        }
        if let Some(index) = self.item_to_index.get_mut(item_key) {
            *index = item_index;
        }
    }

    /// The item index to focus when entering `group_key`.
    ///
    /// Falls back to `group_start_index` when nothing is remembered.
    pub fn index_for_group(&self, group_key: &str, group_start_index: usize) -> usize {
        self.group_to_item
            .get(group_key)
            .and_then(|item_key| self.item_to_index.get(item_key))
            .copied()
            .unwrap_or(group_start_index)
    }

    /// Index of the most recently focused item, or 0.
    pub fn last_focused_item_index(&self) -> usize {
        self.last_focused_item_index
    }

    /// Key of the most recently focused item.
    pub fn last_focused_item_key(&self) -> Option<&str> {
        self.last_focused_item_key.as_deref()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.group_to_item.clear();
        self.item_to_index.clear();
        self.last_focused_item_key = None;
        self.last_focused_item_index = 0;
    }

    /// Number of groups with a remembered item.
    pub fn len(&self) -> usize {
        self.group_to_item.len()
    }

    /// Returns `true` if no group has a remembered item.
    pub fn is_empty(&self) -> bool {
        self.group_to_item.is_empty()
    }

    // =========================================================================
    // Edit reconciliation
    // =========================================================================

    /// An item was inserted at `index`.
    pub(crate) fn on_inserted(&mut self, index: usize) {
        self.shift(|i| if i >= index { i + 1 } else { i });
    }

    /// The item with `item_key` was removed from `index`.
    pub(crate) fn on_removed(&mut self, item_key: &str, index: usize) {
        self.delete_item(item_key);
        self.shift(|i| if i > index { i - 1 } else { i });
    }

    /// The item with `item_key` moved from `old_index` to `new_index`.
    pub(crate) fn on_moved(&mut self, item_key: &str, old_index: usize, new_index: usize) {
        let remembered = self.item_to_index.contains_key(item_key);
        self.shift(|i| {
            let i = if i > old_index { i - 1 } else { i };
            if i >= new_index { i + 1 } else { i }
        });
        if remembered || self.last_focused_item_key.as_deref() == Some(item_key) {
            self.update_item_index(item_key, new_index);
        }
    }

    fn shift(&mut self, map: impl Fn(usize) -> usize) {
        for index in self.item_to_index.values_mut() {
            *index = map(*index);
        }
        if self.last_focused_item_key.is_some() {
            self.last_focused_item_index = map(self.last_focused_item_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_focus() {
        let focus = FocusedItem::default();
        assert_eq!(focus, FocusedItem::item(0));
        assert!(focus.is_item());
    }

    #[test]
    fn test_focus_serializes_with_type_tag() {
        let json = serde_json::to_string(&FocusedItem::group_header(2)).unwrap();
        assert_eq!(json, r#"{"type":"groupHeader","index":2}"#);
    }

    #[test]
    fn test_focus_shifts() {
        let mut focus = FocusedItem::item(5);
        focus.on_inserted(5);
        assert_eq!(focus.index, 6);
        focus.on_inserted(9);
        assert_eq!(focus.index, 6);
        focus.on_removed(2, Some(20));
        assert_eq!(focus.index, 5);
        focus.on_removed(5, Some(20));
        assert_eq!(focus.index, 5);
        focus.on_removed(5, Some(3));
        assert_eq!(focus.index, 2);
    }

    #[test]
    fn test_focus_clamps_to_count() {
        let mut focus = FocusedItem::item(25);
        focus.clamp_to(26);
        assert_eq!(focus.index, 25);
        focus.clamp_to(25);
        assert_eq!(focus.index, 24);
        focus.clamp_to(0);
        assert_eq!(focus.index, 0);

        let mut header = FocusedItem::group_header(4);
        header.clamp_to(2);
        assert_eq!(header.index, 4);
    }

    #[test]
    fn test_focus_follows_moved_item() {
        let mut focus = FocusedItem::item(3);
        focus.on_moved(3, 8);
        assert_eq!(focus.index, 8);

        focus.on_moved(0, 10);
        assert_eq!(focus.index, 7);
    }

    #[test]
    fn test_header_focus_ignores_item_edits() {
        let mut focus = FocusedItem::group_header(1);
        focus.on_inserted(0);
        focus.on_removed(0, Some(4));
        assert_eq!(focus, FocusedItem::group_header(1));
    }

    #[test]
    fn test_cache_basics() {
        let mut cache = GroupFocusCache::new();
        cache.update_cache("g1", "a", 3);
        cache.update_cache("g2", "x", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.index_for_group("g1", 0), 3);
        assert_eq!(cache.last_focused_item_index(), 10);

        cache.update_item_index("a", 4);
        assert_eq!(cache.index_for_group("g1", 0), 4);

        cache.delete_group("g2");
        assert_eq!(cache.index_for_group("g2", 9), 9);
        // The last focused key survives group deletion.
        assert_eq!(cache.last_focused_item_key(), Some("x"));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.last_focused_item_index(), 0);
    }

    #[test]
    fn test_cache_delete_last_focused() {
        let mut cache = GroupFocusCache::new();
        cache.update_cache("g", "b", 6);
        cache.delete_item("b");
        assert_eq!(cache.last_focused_item_index(), 0);
        assert_eq!(cache.last_focused_item_key(), None);
        assert_eq!(cache.index_for_group("g", 2), 2);
    }

    #[test]
    fn test_cache_tracks_edits() {
        let mut cache = GroupFocusCache::new();
        cache.update_cache("g1", "c", 2);
        cache.update_cache("g2", "m", 12);

        cache.on_inserted(0);
        assert_eq!(cache.index_for_group("g1", 0), 3);
        assert_eq!(cache.index_for_group("g2", 0), 13);

        cache.on_removed("x", 5);
        assert_eq!(cache.index_for_group("g2", 0), 12);

        cache.on_moved("c", 3, 20);
        assert_eq!(cache.index_for_group("g1", 0), 20);
        assert_eq!(cache.index_for_group("g2", 0), 11);

        cache.on_removed("m", 11);
        assert_eq!(cache.index_for_group("g2", 7), 7);
    }
}
