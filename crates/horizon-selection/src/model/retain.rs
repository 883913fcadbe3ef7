//! Reference counting for items pinned as range endpoints.
//!
//! Every range in a [`RangeSet`](super::RangeSet) may pin the items at its two
//! endpoints so that drift can later be detected by re-resolving them. A pin is
//! a [`RetainedItem`]: creating or cloning one increments the item's count in
//! the shared [`RetainTable`], dropping it decrements the count. Releasing a
//! range, merging it away or disposing the whole selection therefore returns
//! the table to zero without any manual bookkeeping.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use horizon_selection_core::logging::targets;

use super::item::{Item, ItemHandle};

/// Retain counts per item handle.
#[derive(Default)]
pub struct RetainTable {
    counts: Mutex<HashMap<ItemHandle, usize>>,
}

impl RetainTable {
    /// Creates an empty, shareable table.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pins `item`, returning the RAII guard.
    pub fn retain(self: &Arc<Self>, item: Item) -> RetainedItem {
        self.add_ref(item.handle);
        RetainedItem {
            item,
            table: self.clone(),
        }
    }

    /// Current count for a single item.
    pub fn count(&self, handle: ItemHandle) -> usize {
        self.counts.lock().get(&handle).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }

    /// Number of distinct items currently pinned.
    pub fn distinct(&self) -> usize {
        self.counts.lock().len()
    }

    fn add_ref(&self, handle: ItemHandle) {
        let mut counts = self.counts.lock();
        let count = counts.entry(handle).or_insert(0);
        *count += 1;
        tracing::trace!(target: targets::RETAIN, %handle, count = *count, "retained");
    }

    fn release(&self, handle: ItemHandle) {
        let mut counts = self.counts.lock();
        match counts.get_mut(&handle) {
            Some(count) if *count > 1 => {
                *count -= 1;
                tracing::trace!(target: targets::RETAIN, %handle, count = *count, "released");
            }
            Some(_) => {
                counts.remove(&handle);
                tracing::trace!(target: targets::RETAIN, %handle, "released last reference");
            }
            None => {
                tracing::warn!(target: targets::RETAIN, %handle, "release without retain");
            }
        }
    }
}

impl fmt::Debug for RetainTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetainTable")
            .field("distinct", &self.distinct())
            .field("total", &self.total())
            .finish()
    }
}

/// A pinned item. Dereferences to the [`Item`].
pub struct RetainedItem {
    item: Item,
    table: Arc<RetainTable>,
}

impl RetainedItem {
    /// The pinned item.
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// The pinned item's handle.
    pub fn handle(&self) -> ItemHandle {
        self.item.handle
    }
}

impl Deref for RetainedItem {
    type Target = Item;

    fn deref(&self) -> &Item {
        &self.item
    }
}

impl Clone for RetainedItem {
    fn clone(&self) -> Self {
        self.table.retain(self.item.clone())
    }
}

impl Drop for RetainedItem {
    fn drop(&mut self) {
        self.table.release(self.item.handle);
    }
}

impl fmt::Debug for RetainedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RetainedItem").field(&self.item.key).finish()
    }
}
