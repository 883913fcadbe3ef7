//! In-memory item source.
//!
//! `MemoryItemSource` keeps its items in a `Vec` and reports every mutation as
//! a [`SourceEdit`]. Fetches can be slowed down with a fixed latency and made to
//! fail with a [`FetchFault`], which is how the selection tests exercise slow
//! and unreliable data layers.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use horizon_selection_core::Signal;
use horizon_selection_core::logging::targets;

use super::{ItemSource, ItemsFetch, SourceEdit};
use crate::error::{SourceError, SourceResult};
use crate::model::{Item, ItemRecord};

/// A failure injected into every item fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFault {
    /// Fetches fail as if the item did not exist.
    DoesNotExist,
    /// Fetches fail as if the backing store did not answer.
    NoResponse,
}

impl From<FetchFault> for SourceError {
    fn from(fault: FetchFault) -> Self {
        match fault {
            FetchFault::DoesNotExist => SourceError::DoesNotExist,
            FetchFault::NoResponse => SourceError::NoResponse,
        }
    }
}

/// A `Vec`-backed [`ItemSource`].
///
/// # Example
///
/// ```
/// use horizon_selection::source::MemoryItemSource;
///
/// let source = MemoryItemSource::from_keys(["a", "b", "c"]);
/// source.insert(1, "x");
/// assert_eq!(source.keys(), vec!["a", "x", "b", "c"]);
/// ```
pub struct MemoryItemSource {
    items: RwLock<Vec<Item>>,
    latency: Mutex<Duration>,
    fault: Mutex<Option<FetchFault>>,
    edits: Signal<SourceEdit>,
}

impl MemoryItemSource {
    /// Creates a source over `items`.
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items: RwLock::new(items),
            latency: Mutex::new(Duration::ZERO),
            fault: Mutex::new(None),
            edits: Signal::new(),
        }
    }

    /// Creates a source with one item per key; each payload is the key itself.
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::new(keys.into_iter().map(Self::record).collect())
    }

    /// Creates a 26-item source keyed `"a"` to `"z"`.
    pub fn alphabet() -> Self {
        Self::from_keys(('a'..='z').map(String::from))
    }

    /// Sets the delay applied before every fetch and count answers.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    /// Wraps the source for sharing with a selection.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn record(key: impl Into<String>) -> Item {
        let key = key.into();
        Arc::new(ItemRecord::new(key.clone(), Value::String(key)))
    }

    // =========================================================================
    // Test knobs
    // =========================================================================

    /// Changes the fetch latency.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Makes every following item fetch fail, or restores normal operation.
    pub fn set_fault(&self, fault: Option<FetchFault>) {
        *self.fault.lock() = fault;
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_fault(&self) -> SourceResult<()> {
        match *self.fault.lock() {
            Some(fault) => {
                tracing::debug!(target: targets::SOURCE, ?fault, "injected fetch fault");
                Err(fault.into())
            }
            None => Ok(()),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// The item at `index`.
    pub fn item(&self, index: usize) -> Option<Item> {
        self.items.read().get(index).cloned()
    }

    /// Snapshot of every key, in order.
    pub fn keys(&self) -> Vec<String> {
        self.items.read().iter().map(|item| item.key.clone()).collect()
    }

    /// Position of the item with `key`.
    pub fn index_of_key(&self, key: &str) -> Option<usize> {
        self.items.read().iter().position(|item| item.key == key)
    }

    fn window(&self, index: usize, before: usize, after: usize) -> SourceResult<ItemsFetch> {
        let items = self.items.read();
        if index >= items.len() {
            return Err(SourceError::DoesNotExist);
        }
        let start = index.saturating_sub(before);
        let end = index.saturating_add(after).saturating_add(1).min(items.len());
        Ok(ItemsFetch {
            items: items[start..end].to_vec(),
            offset: index - start,
            absolute_index: index,
            total_count: Some(items.len()),
        })
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Appends an item with `key`.
    pub fn push(&self, key: impl Into<String>) -> Item {
        let index = self.len();
        self.insert(index, key)
    }

    /// Inserts an item with `key` at `index` (clamped to the length).
    pub fn insert(&self, index: usize, key: impl Into<String>) -> Item {
        let item = Self::record(key);
        self.insert_item(index, item.clone());
        item
    }

    /// Inserts an existing record at `index` (clamped to the length).
    pub fn insert_item(&self, index: usize, item: Item) {
        let (index, old_count) = {
            let mut items = self.items.write();
            let index = index.min(items.len());
            items.insert(index, item.clone());
            (index, items.len() - 1)
        };
        self.edits.emit(SourceEdit::Inserted { item, index });
        self.emit_count(old_count + 1, old_count);
    }

    /// Removes the item at `index`.
    pub fn remove(&self, index: usize) -> Option<Item> {
        let (item, old_count) = {
            let mut items = self.items.write();
            if index >= items.len() {
                return None;
            }
            let old_count = items.len();
            (items.remove(index), old_count)
        };
        self.edits.emit(SourceEdit::Removed {
            item: item.clone(),
            index,
            mirage: false,
        });
        self.emit_count(old_count - 1, old_count);
        Some(item)
    }

    /// Removes every item with an index in `first..=last`, highest first.
    pub fn remove_range(&self, first: usize, last: usize) -> Vec<Item> {
        let mut removed: Vec<Item> = (first..=last)
            .rev()
            .filter_map(|index| self.remove(index))
            .collect();
        removed.reverse();
        removed
    }

    /// Moves the item at `from` so that it ends up at `to`.
    ///
    /// `to` is measured after the item has been taken out. Returns `false` if
    /// either position is out of range.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        let item = {
            let mut items = self.items.write();
            if from >= items.len() || to >= items.len() {
                return false;
            }
            let item = items.remove(from);
            items.insert(to, item.clone());
            item
        };
        self.edits.emit(SourceEdit::Moved {
            item,
            old_index: from,
            new_index: to,
        });
        true
    }

    /// Replaces the payload of the item at `index`.
    ///
    /// The replacement keeps the key but gets a fresh handle. Returns the new
    /// record.
    pub fn replace(&self, index: usize, data: Value) -> Option<Item> {
        let (new_item, old_item) = {
            let mut items = self.items.write();
            let slot = items.get_mut(index)?;
            let new_item = Arc::new(ItemRecord::new(slot.key.clone(), data));
            let old_item = std::mem::replace(slot, new_item.clone());
            (new_item, old_item)
        };
        self.edits.emit(SourceEdit::Changed {
            new_item: new_item.clone(),
            old_item,
            index,
        });
        Some(new_item)
    }

    /// Announces and immediately retracts an item that never became real.
    pub fn retract_mirage(&self, index: usize, key: impl Into<String>) {
        self.edits.emit(SourceEdit::Removed {
            item: Self::record(key),
            index,
            mirage: true,
        });
    }

    /// Replaces every item and announces a reload.
    pub fn set_items(&self, items: Vec<Item>) {
        let (new_count, old_count) = {
            let mut current = self.items.write();
            let old_count = current.len();
            *current = items;
            (current.len(), old_count)
        };
        tracing::debug!(target: targets::SOURCE, new_count, old_count, "source reloaded");
        self.edits.emit(SourceEdit::Reload);
        self.emit_count(new_count, old_count);
    }

    /// Replaces every item without emitting any edit.
    ///
    /// Simulates a source whose edit stream was lost; selections only notice
    /// through revalidation.
    pub fn replace_items_silently(&self, items: Vec<Item>) {
        *self.items.write() = items;
    }

    /// Announces a reload without changing any item.
    pub fn reload(&self) {
        tracing::debug!(target: targets::SOURCE, "source reload requested");
        self.edits.emit(SourceEdit::Reload);
    }

    fn emit_count(&self, new_count: usize, old_count: usize) {
        if new_count != old_count {
            self.edits.emit(SourceEdit::CountChanged {
                new_count,
                old_count,
            });
        }
    }
}

impl ItemSource for MemoryItemSource {
    fn items_from_index(
        &self,
        index: usize,
        before: usize,
        after: usize,
    ) -> BoxFuture<'_, SourceResult<ItemsFetch>> {
        Box::pin(async move {
            self.delay().await;
            self.check_fault()?;
            self.window(index, before, after)
        })
    }

    fn items_from_key<'a>(
        &'a self,
        key: &'a str,
        before: usize,
        after: usize,
    ) -> BoxFuture<'a, SourceResult<ItemsFetch>> {
        Box::pin(async move {
            self.delay().await;
            self.check_fault()?;
            let index = self.index_of_key(key).ok_or(SourceError::DoesNotExist)?;
            self.window(index, before, after)
        })
    }

    fn count(&self) -> BoxFuture<'_, SourceResult<usize>> {
        Box::pin(async move {
            self.delay().await;
            Ok(self.len())
        })
    }

    fn notifications(&self) -> &Signal<SourceEdit> {
        &self.edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(source: &MemoryItemSource) -> Arc<Mutex<Vec<SourceEdit>>> {
        let edits = Arc::new(Mutex::new(Vec::new()));
        let edits_clone = edits.clone();
        source
            .notifications()
            .connect(move |edit| edits_clone.lock().push(edit.clone()));
        edits
    }

    #[tokio::test]
    async fn test_fetch_window() {
        let source = MemoryItemSource::alphabet();
        let fetch = source.items_from_index(1, 2, 1).await.unwrap();
        assert_eq!(fetch.items.len(), 3);
        assert_eq!(fetch.offset, 1);
        assert_eq!(fetch.absolute_index, 1);
        assert_eq!(fetch.requested().unwrap().key, "b");
        assert_eq!(fetch.total_count, Some(26));
    }

    #[tokio::test]
    async fn test_fetch_by_key() {
        let source = MemoryItemSource::alphabet();
        let fetch = source.items_from_key("z", 0, 0).await.unwrap();
        assert_eq!(fetch.absolute_index, 25);

        let missing = source.items_from_key("$", 0, 0).await;
        assert_eq!(missing.unwrap_err(), SourceError::DoesNotExist);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let source = MemoryItemSource::alphabet();
        source.set_fault(Some(FetchFault::NoResponse));
        assert_eq!(
            source.items_from_index(0, 0, 0).await.unwrap_err(),
            SourceError::NoResponse
        );
        source.set_fault(None);
        assert!(source.items_from_index(0, 0, 0).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let source = MemoryItemSource::alphabet().with_latency(Duration::from_millis(50));
        let started = tokio::time::Instant::now();
        assert_eq!(source.count().await.unwrap(), 26);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_edits_are_ordered() {
        let source = MemoryItemSource::from_keys(["a", "b", "c"]);
        let edits = recorded(&source);

        source.insert(1, "x");
        source.remove(0);
        source.move_item(0, 2);

        let edits = edits.lock();
        assert!(matches!(edits[0], SourceEdit::Inserted { index: 1, .. }));
        assert!(matches!(
            edits[1],
            SourceEdit::CountChanged {
                new_count: 4,
                old_count: 3
            }
        ));
        assert!(matches!(edits[2], SourceEdit::Removed { index: 0, mirage: false, .. }));
        assert!(matches!(edits[4], SourceEdit::Moved { old_index: 0, new_index: 2, .. }));
        assert_eq!(source.keys(), vec!["b", "c", "x"]);
    }

    #[test]
    fn test_replace_allocates_new_handle() {
        let source = MemoryItemSource::from_keys(["a"]);
        let old = source.item(0).unwrap();
        let new = source.replace(0, Value::from(7)).unwrap();
        assert_ne!(old.handle, new.handle);
        assert_eq!(new.key, "a");
        assert!(source.replace(3, Value::Null).is_none());
    }
}
