//! Item sources: the data layer a selection resolves against.
//!
//! An [`ItemSource`] answers three questions asynchronously: which items sit
//! around an index, which items sit around a key, and how many items exist.
//! It also publishes an ordered stream of [`SourceEdit`]s through a
//! [`Signal`]; the selection manager subscribes to that stream and keeps its
//! ranges in step with the data.
//!
//! [`MemoryItemSource`] is a `Vec`-backed implementation with optional
//! latency and fault injection.

mod memory;

pub use memory::{FetchFault, MemoryItemSource};

use futures_util::future::BoxFuture;
use horizon_selection_core::Signal;

use crate::error::SourceResult;
use crate::model::Item;

/// The result of a windowed fetch.
#[derive(Debug, Clone)]
pub struct ItemsFetch {
    /// The fetched window of items, in index order.
    pub items: Vec<Item>,
    /// Position of the requested item within `items`.
    pub offset: usize,
    /// Absolute index of the requested item.
    pub absolute_index: usize,
    /// Total item count, if the source knows it.
    pub total_count: Option<usize>,
}

impl ItemsFetch {
    /// The item that was asked for.
    pub fn requested(&self) -> Option<&Item> {
        self.items.get(self.offset)
    }
}

/// An ordered edit notification from an item source.
///
/// Indices are absolute positions in the sequence at the moment the edit is
/// emitted, i.e. after every earlier edit has been applied.
#[derive(Debug, Clone)]
pub enum SourceEdit {
    /// `item` now occupies `index`; later items shifted up by one.
    Inserted { item: Item, index: usize },
    /// The item at `index` was removed; later items shifted down by one.
    ///
    /// A mirage removal retracts an item that was never really part of the
    /// sequence; it carries no index shift.
    Removed {
        item: Item,
        index: usize,
        mirage: bool,
    },
    /// `item` moved from `old_index` to `new_index` (both absolute, the latter
    /// measured after the item was taken out).
    Moved {
        item: Item,
        old_index: usize,
        new_index: usize,
    },
    /// The item at `index` was replaced by a record with new contents.
    Changed {
        new_item: Item,
        old_item: Item,
        index: usize,
    },
    /// The item count changed.
    CountChanged { new_count: usize, old_count: usize },
    /// Every item may have changed; no index correspondence survives.
    Reload,
}

/// The asynchronous data layer behind a selection.
///
/// Fetches use `before`/`after` to request a window around the anchor item;
/// sources are free to return fewer neighbours than asked for. An anchor
/// that does not exist must fail with
/// [`SourceError::DoesNotExist`](crate::error::SourceError::DoesNotExist).
pub trait ItemSource: Send + Sync {
    /// Fetches the item at `index` and up to `before`/`after` neighbours.
    fn items_from_index(
        &self,
        index: usize,
        before: usize,
        after: usize,
    ) -> BoxFuture<'_, SourceResult<ItemsFetch>>;

    /// Fetches the item with `key` and up to `before`/`after` neighbours.
    fn items_from_key<'a>(
        &'a self,
        key: &'a str,
        before: usize,
        after: usize,
    ) -> BoxFuture<'a, SourceResult<ItemsFetch>>;

    /// Resolves the current item count.
    fn count(&self) -> BoxFuture<'_, SourceResult<usize>>;

    /// The ordered edit stream.
    fn notifications(&self) -> &Signal<SourceEdit>;
}
