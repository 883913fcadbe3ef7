//! Asynchronous selection over an item source.
//!
//! A [`Selection`] owns one [`RangeSet`] and resolves [`Selector`]s against
//! its item source (the *site*). Mutations return futures, but each one takes
//! its place in the selection's [`SerialQueue`] at the moment it is called:
//! five overlapping `add`/`remove` calls commit in call order no matter how
//! long each one's fetches take.
//!
//! Reads (`ranges`, `indices`, `count`, `contains`) are synchronous snapshots
//! of the committed state.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_selection::model::{IndexRange, Selection};
//! use horizon_selection::source::MemoryItemSource;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let selection = Selection::new(Arc::new(MemoryItemSource::alphabet()));
//!
//! selection.set("b").await.unwrap();
//! assert_eq!(selection.ranges(), vec![IndexRange::new(1, 1)]);
//!
//! selection.add(4usize..=6).await.unwrap();
//! assert_eq!(selection.indices().unwrap(), vec![1, 4, 5, 6]);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tracing::Instrument;

use horizon_selection_core::logging::{span_names, targets};
use horizon_selection_core::{QueueTicket, SerialQueue};

use super::index::IndexRange;
use super::item::Item;
use super::range_set::{PinnedRange, RangeSet};
use super::retain::RetainTable;
use super::selector::Selector;
use crate::config::SelectionConfig;
use crate::error::{SelectionResult, SourceError};
use crate::source::{ItemSource, SourceEdit};

/// How resolved ranges are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Set,
    Add,
    Remove,
}

/// A resolved endpoint: its index and, when resolved by key, its item.
struct Endpoint {
    index: usize,
    item: Option<Item>,
}

struct SelectionInner {
    site: Arc<dyn ItemSource>,
    retain: Arc<RetainTable>,
    config: SelectionConfig,
    state: Mutex<RangeSet>,
    /// Bumped for every applied edit; a mutation that sees it change while
    /// fetching knows its indices may be stale.
    edits: AtomicU64,
    queue: SerialQueue,
}

/// A shared handle to a selection.
///
/// Cloning yields another handle to the same selection; use
/// [`detached_copy`](Self::detached_copy) for an independent one.
#[derive(Clone)]
pub struct Selection {
    inner: Arc<SelectionInner>,
}

impl Selection {
    /// Creates an empty selection over `site` with the default configuration.
    pub fn new(site: Arc<dyn ItemSource>) -> Self {
        Self::with_config(site, SelectionConfig::default(), RetainTable::new())
    }

    /// Creates an empty selection sharing `retain` with other selections.
    pub fn with_config(
        site: Arc<dyn ItemSource>,
        config: SelectionConfig,
        retain: Arc<RetainTable>,
    ) -> Self {
        Self {
            inner: Arc::new(SelectionInner {
                site,
                retain,
                config,
                state: Mutex::new(RangeSet::new()),
                edits: AtomicU64::new(0),
                queue: SerialQueue::new(),
            }),
        }
    }

    /// A new selection with a copy of this one's ranges and its own queue.
    ///
    /// The copy pins the same endpoint items, adding to their retain counts.
    pub fn detached_copy(&self) -> Self {
        let state = self.inner.state.lock().clone();
        Self {
            inner: Arc::new(SelectionInner {
                site: self.inner.site.clone(),
                retain: self.inner.retain.clone(),
                config: self.inner.config.clone(),
                state: Mutex::new(state),
                edits: AtomicU64::new(0),
                queue: SerialQueue::new(),
            }),
        }
    }

    /// The retain table tracking this selection's endpoint pins.
    pub fn retained_items(&self) -> &Arc<RetainTable> {
        &self.inner.retain
    }

    /// Returns `true` if both handles refer to the same selection.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Replaces the selection with the union of `selector`'s elements.
    ///
    /// [`Selector::None`] or an empty union clears the selection.
    pub fn set(&self, selector: impl Into<Selector>) -> BoxFuture<'static, SelectionResult<()>> {
        self.mutate(Mutation::Set, selector.into())
    }

    /// Adds `selector`'s elements to the selection.
    pub fn add(&self, selector: impl Into<Selector>) -> BoxFuture<'static, SelectionResult<()>> {
        self.mutate(Mutation::Add, selector.into())
    }

    /// Removes `selector`'s elements from the selection.
    pub fn remove(&self, selector: impl Into<Selector>) -> BoxFuture<'static, SelectionResult<()>> {
        self.mutate(Mutation::Remove, selector.into())
    }

    /// Clears the selection.
    pub fn clear(&self) -> BoxFuture<'static, SelectionResult<()>> {
        let inner = self.inner.clone();
        let mut ticket = inner.queue.enqueue();
        async move {
            ticket.wait_turn().await?;
            inner.state.lock().clear();
            Ok(())
        }
        .boxed()
    }

    /// Selects every current and future item.
    ///
    /// Resolves the item count first; a source with no items yields an
    /// everything selection whose `count()` is 0.
    pub fn select_all(&self) -> BoxFuture<'static, SelectionResult<()>> {
        let inner = self.inner.clone();
        let mut ticket = inner.queue.enqueue();
        async move {
            ticket.wait_turn().await?;
            inner.resolve_extent().await?;
            inner.state.lock().select_all();
            Ok(())
        }
        .boxed()
    }

    /// Fetches the item record of every selected index, ascending.
    pub fn items(&self) -> BoxFuture<'static, SelectionResult<Vec<Item>>> {
        let inner = self.inner.clone();
        let mut ticket = inner.queue.enqueue();
        async move {
            ticket.wait_turn().await?;
            inner.fetch_items().await
        }
        .boxed()
    }

    /// Re-resolves every pinned endpoint by key and corrects drifted bounds.
    ///
    /// Endpoints whose item no longer exists are unpinned; a range that loses
    /// every pinned item is dropped.
    pub fn revalidate(&self) -> BoxFuture<'static, SelectionResult<()>> {
        let inner = self.inner.clone();
        let mut ticket = inner.queue.enqueue();
        async move {
            ticket.wait_turn().await?;
            inner.revalidate_pins().await
        }
        .boxed()
    }

    fn mutate(&self, mutation: Mutation, selector: Selector) -> BoxFuture<'static, SelectionResult<()>> {
        let inner = self.inner.clone();
        let ticket = inner.queue.enqueue();
        let span = tracing::debug_span!(
            target: targets::SELECTION,
            span_names::MUTATION,
            ?mutation,
            ticket = ticket.id().as_u64()
        );
        inner.run_mutation(ticket, mutation, selector).instrument(span).boxed()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of the selected ranges.
    pub fn ranges(&self) -> Vec<IndexRange> {
        self.inner.state.lock().ranges()
    }

    /// Every selected index, ascending.
    pub fn indices(&self) -> SelectionResult<Vec<usize>> {
        self.inner.state.lock().indices()
    }

    /// Number of selected items.
    pub fn count(&self) -> usize {
        self.inner.state.lock().count()
    }

    /// Returns `true` if every item is selected.
    pub fn is_everything(&self) -> bool {
        self.inner.state.lock().is_everything()
    }

    /// Returns `true` if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().is_empty()
    }

    /// Returns `true` if `index` is selected.
    pub fn contains(&self, index: usize) -> bool {
        self.inner.state.lock().contains(index)
    }

    /// The last item count this selection has seen.
    pub fn extent(&self) -> Option<usize> {
        self.inner.state.lock().extent()
    }

    /// Number of endpoints currently pinning an item.
    pub fn pinned_endpoint_count(&self) -> usize {
        self.inner.state.lock().pinned_endpoints().len()
    }

    // =========================================================================
    // Crate-internal plumbing
    // =========================================================================

    /// Runs `f` against the committed range set.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut RangeSet) -> R) -> R {
        f(&mut self.inner.state.lock())
    }

    /// Replaces the committed range set, returning the previous one.
    pub(crate) fn replace_state(&self, state: RangeSet) -> RangeSet {
        std::mem::replace(&mut *self.inner.state.lock(), state)
    }

    /// Takes the committed range set, leaving an empty one.
    pub(crate) fn take_state(&self) -> RangeSet {
        std::mem::take(&mut *self.inner.state.lock())
    }

    /// Fails every queued mutation and releases every pin.
    pub(crate) fn shut_down(&self) {
        self.inner.queue.close();
        self.inner.state.lock().reset();
    }

    /// Applies a source edit to the committed ranges.
    pub(crate) fn apply_edit(&self, edit: &SourceEdit) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        match edit {
            SourceEdit::Inserted { index, .. } => state.on_inserted(*index, true),
            SourceEdit::Removed { mirage: true, .. } => return,
            SourceEdit::Removed { index, .. } => state.on_removed(*index),
            SourceEdit::Moved {
                item,
                old_index,
                new_index,
            } => {
                let pin = inner
                    .config
                    .pin_endpoints
                    .then(|| inner.retain.retain(item.clone()));
                state.on_moved(*old_index, *new_index, pin);
            }
            SourceEdit::Changed {
                new_item, old_item, ..
            } => {
                let pin = inner.retain.retain(new_item.clone());
                state.on_changed(old_item.handle, &pin);
            }
            SourceEdit::CountChanged { new_count, .. } => state.set_extent(Some(*new_count)),
            SourceEdit::Reload => state.reset(),
        }
        inner.edits.fetch_add(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("ranges", &self.ranges())
            .field("everything", &self.is_everything())
            .finish()
    }
}

impl SelectionInner {
    async fn run_mutation(
        self: Arc<Self>,
        mut ticket: QueueTicket,
        mutation: Mutation,
        selector: Selector,
    ) -> SelectionResult<()> {
        ticket.wait_turn().await?;

        let edits_before = self.edits.load(Ordering::SeqCst);
        let count = self.resolve_extent().await?;
        let pin = mutation != Mutation::Remove && self.config.pin_endpoints;

        let mut resolved = Vec::new();
        for element in selector.into_elements() {
            let span = tracing::trace_span!(target: targets::SELECTION, span_names::RESOLVE, ?element);
            if let Some(range) = self.resolve_element(element, count, pin).instrument(span).await? {
                resolved.push(range);
            }
        }

        {
            let mut state = self.state.lock();
            match mutation {
                Mutation::Set => {
                    state.clear();
                    for range in resolved {
                        state.add(range);
                    }
                }
                Mutation::Add => {
                    for range in resolved {
                        state.add(range);
                    }
                }
                Mutation::Remove => {
                    for range in resolved {
                        state.remove(range)?;
                    }
                }
            }
        }

        if self.edits.load(Ordering::SeqCst) != edits_before {
            tracing::debug!(target: targets::SELECTION, "edits arrived during resolution, revalidating");
            if let Err(err) = self.revalidate_pins().await {
                tracing::warn!(target: targets::SELECTION, error = %err, "revalidation failed");
            }
        }
        self.pin_missing_endpoints().await;
        Ok(())
    }

    /// Fetches the item count and records it as the extent.
    async fn resolve_extent(&self) -> SelectionResult<usize> {
        let edits_before = self.edits.load(Ordering::SeqCst);
        let count = self.site.count().await.inspect_err(|err| {
            tracing::warn!(target: targets::SELECTION, error = %err, "count query failed");
        })?;
        let mut state = self.state.lock();
        if self.edits.load(Ordering::SeqCst) == edits_before {
            state.set_extent(Some(count));
        }
        Ok(state.extent().unwrap_or(count))
    }

    async fn resolve_element(
        &self,
        element: Selector,
        count: usize,
        pin: bool,
    ) -> SelectionResult<Option<PinnedRange>> {
        let bounds = match element {
            Selector::Index(index) => {
                let endpoint = self.index_endpoint(Some(index), count);
                endpoint.map(|e| (Endpoint { index: e.index, item: None }, e))
            }
            Selector::Range { first, last } => {
                if first > last || first >= count {
                    None
                } else {
                    Some((
                        Endpoint { index: first, item: None },
                        Endpoint {
                            index: last.min(count - 1),
                            item: None,
                        },
                    ))
                }
            }
            Selector::Key(key) => self.key_endpoint(&key).await?.map(|e| {
                let copy = Endpoint {
                    index: e.index,
                    item: None,
                };
                (e, copy)
            }),
            Selector::KeyRange {
                first_key,
                last_key,
            } => {
                let first = self.key_endpoint(&first_key).await?;
                let last = self.key_endpoint(&last_key).await?;
                first.zip(last)
            }
            Selector::Mixed {
                first_key,
                first_index,
                last_key,
                last_index,
            } => {
                let first = self.hinted_endpoint(first_key, first_index, count).await?;
                let last = self.hinted_endpoint(last_key, last_index, count).await?;
                first.zip(last)
            }
            Selector::Many(_) | Selector::None | Selector::Invalid => None,
        };

        let Some((first, last)) = bounds else {
            tracing::debug!(target: targets::SELECTION, "selector element resolved to nothing");
            return Ok(None);
        };
        if first.index > last.index {
            tracing::debug!(
                target: targets::SELECTION,
                first = first.index,
                last = last.index,
                "selector endpoints out of order"
            );
            return Ok(None);
        }

        let mut range = PinnedRange::new(first.index, last.index);
        if pin {
            if let Some(item) = first.item {
                range = range.with_first_item(self.retain.retain(item));
            }
            if let Some(item) = last.item {
                range = range.with_last_item(self.retain.retain(item));
            }
        }
        Ok(Some(range))
    }

    fn index_endpoint(&self, index: Option<usize>, count: usize) -> Option<Endpoint> {
        index
            .filter(|&index| index < count)
            .map(|index| Endpoint { index, item: None })
    }

    async fn key_endpoint(&self, key: &str) -> SelectionResult<Option<Endpoint>> {
        match self.site.items_from_key(key, 0, 0).await {
            Ok(fetch) => Ok(Some(Endpoint {
                index: fetch.absolute_index,
                item: fetch.requested().cloned(),
            })),
            Err(err) if err.is_missing() => {
                tracing::debug!(target: targets::SELECTION, key, "key does not resolve");
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(target: targets::SELECTION, key, error = %err, "key lookup failed");
                Err(err.into())
            }
        }
    }

    async fn hinted_endpoint(
        &self,
        key: Option<String>,
        index: Option<usize>,
        count: usize,
    ) -> SelectionResult<Option<Endpoint>> {
        if let Some(key) = key
            && let Some(endpoint) = self.key_endpoint(&key).await?
        {
            return Ok(Some(endpoint));
        }
        Ok(self.index_endpoint(index, count))
    }

    async fn fetch_items(&self) -> SelectionResult<Vec<Item>> {
        let ranges = {
            let needs_extent = {
                let state = self.state.lock();
                state.is_everything() && state.extent().is_none()
            };
            if needs_extent {
                self.resolve_extent().await?;
            }
            self.state.lock().ranges()
        };

        let page_size = self.config.page_size();
        let mut items = Vec::new();
        for range in ranges {
            let mut index = range.first_index;
            while index <= range.last_index {
                let wanted = (range.last_index - index + 1).min(page_size);
                let fetch = match self.site.items_from_index(index, 0, wanted - 1).await {
                    Ok(fetch) => fetch,
                    Err(err) if err.is_missing() => break,
                    Err(err) => {
                        tracing::warn!(target: targets::SELECTION, index, error = %err, "item fetch failed");
                        return Err(err.into());
                    }
                };
                let before = items.len();
                items.extend(fetch.items.iter().skip(fetch.offset).take(wanted).cloned());
                let fetched = items.len() - before;
                if fetched == 0 {
                    break;
                }
                index += fetched;
            }
        }
        Ok(items)
    }

    async fn revalidate_pins(&self) -> SelectionResult<()> {
        let (pins, edits_before) = {
            let state = self.state.lock();
            (state.pinned_endpoints(), self.edits.load(Ordering::SeqCst))
        };
        if pins.is_empty() {
            return Ok(());
        }

        let mut resolved = HashMap::new();
        for pin in pins {
            let current = match self.site.items_from_key(&pin.item.key, 0, 0).await {
                Ok(fetch) => Some(fetch.absolute_index),
                Err(SourceError::DoesNotExist) => None,
                Err(err) => return Err(err.into()),
            };
            resolved.insert(pin.item.handle, current);
        }

        let mut state = self.state.lock();
        if self.edits.load(Ordering::SeqCst) != edits_before {
            tracing::debug!(target: targets::SELECTION, "edits arrived during revalidation, keeping shifted bounds");
            return Ok(());
        }
        if state.relocate(&resolved) {
            tracing::debug!(target: targets::SELECTION, ranges = ?state.ranges(), "corrected drifted ranges");
        }
        Ok(())
    }

    /// Pins every endpoint that has no item yet. Failures leave it unpinned.
    async fn pin_missing_endpoints(&self) {
        if !self.config.pin_endpoints {
            return;
        }
        let (missing, edits_before) = {
            let state = self.state.lock();
            (state.unpinned_endpoints(), self.edits.load(Ordering::SeqCst))
        };

        let mut fetched = Vec::with_capacity(missing.len());
        for index in missing {
            match self.site.items_from_index(index, 0, 0).await {
                Ok(fetch) => {
                    if let Some(item) = fetch.requested() {
                        fetched.push((index, item.clone()));
                    }
                }
                Err(err) => {
                    tracing::debug!(target: targets::SELECTION, index, error = %err, "could not pin endpoint");
                }
            }
        }

        let mut state = self.state.lock();
        if self.edits.load(Ordering::SeqCst) != edits_before {
            return;
        }
        for (index, item) in fetched {
            state.pin(index, self.retain.retain(item));
        }
    }
}
