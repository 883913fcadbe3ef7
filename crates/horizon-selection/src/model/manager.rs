//! Selection policy, change notification and edit reconciliation.
//!
//! [`SelectionManager`] is what a list control talks to. It owns the live
//! [`Selection`] and adds:
//!
//! - a selection-mode gate ([`SelectionMode`]),
//! - a two-phase change protocol: every mutation is first applied to a
//!   *candidate* copy, announced through
//!   [`selection_changing`](SelectionManager::selection_changing) where
//!   handlers may rewrite or veto it, and only then committed and announced
//!   through [`selection_changed`](SelectionManager::selection_changed),
//! - FIFO ordering of mutations across the whole manager,
//! - synchronous reconciliation of the live selection, every in-flight
//!   candidate, the focus and the group focus cache against the item source's
//!   edit stream.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_selection::model::{ChangeOutcome, IndexRange, SelectionManager};
//! use horizon_selection::source::MemoryItemSource;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let manager = SelectionManager::new(Arc::new(MemoryItemSource::alphabet()));
//!
//! // Rewrite every change to select items 9 and 10 instead.
//! manager.selection_changing().connect(|event| {
//!     event.defer(event.new_selection().set(vec![9usize, 10]));
//! });
//!
//! let outcome = manager.set(vec![0usize, 1]).await.unwrap();
//! assert_eq!(outcome, ChangeOutcome::Committed);
//! assert_eq!(manager.ranges(), vec![IndexRange::new(9, 10)]);
//! # });
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::Instrument;

use horizon_selection_core::logging::{span_names, targets};
use horizon_selection_core::{
    ConnectionGuard, PerfSpan, QueueTicket, SerialQueue, Signal, selection_debug, selection_trace,
    selection_warn,
};

use super::focus::{FocusedItem, GroupFocusCache};
use super::index::IndexRange;
use super::item::Item;
use super::retain::RetainTable;
use super::selection::Selection;
use super::selector::Selector;
use crate::config::{SelectionConfig, SelectionMode};
use crate::error::SelectionResult;
use crate::source::{ItemSource, SourceEdit};

/// A handler's verdict on a pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// Let the change commit.
    Proceed,
    /// Drop the change; the live selection stays as it was.
    Veto,
}

/// How a mutation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The change was committed.
    Committed,
    /// A `selection_changing` handler vetoed the change.
    Vetoed,
    /// The selection mode does not allow the change.
    NotAllowed,
    /// A reload or disposal overtook the change; nothing was committed.
    Abandoned,
}

impl ChangeOutcome {
    /// Returns `true` for [`ChangeOutcome::Committed`].
    pub fn is_committed(self) -> bool {
        self == Self::Committed
    }
}

/// A point-in-time view of the committed selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSnapshot {
    /// Selected ranges.
    pub ranges: Vec<IndexRange>,
    /// Whether every item is selected.
    pub everything: bool,
    /// Number of selected items.
    pub count: usize,
    /// Manager version at the time of the snapshot.
    pub version: u64,
}

/// The view layer's hook for repainting after a commit.
pub trait SelectionView: Send + Sync {
    /// Called after every committed change with the previous and new state.
    fn update_selection(&self, old: &SelectionSnapshot, new: &SelectionSnapshot);
}

struct ChangingInner {
    new_selection: Selection,
    prevented: AtomicBool,
    promise: Mutex<Option<BoxFuture<'static, ChangeDecision>>>,
    deferred: Mutex<Vec<BoxFuture<'static, SelectionResult<()>>>>,
}

/// The payload of [`SelectionManager::selection_changing`].
///
/// Handlers run synchronously during emission. They may inspect or rewrite
/// [`new_selection`](Self::new_selection), veto with
/// [`prevent_default`](Self::prevent_default), or extend the decision window
/// with [`set_promise`](Self::set_promise) and [`defer`](Self::defer). The
/// manager awaits deferred work and the promise before committing.
///
/// Handlers must not await mutations of the manager itself: those are queued
/// behind the change being decided.
#[derive(Clone)]
pub struct SelectionChanging {
    inner: Arc<ChangingInner>,
}

impl SelectionChanging {
    fn new(new_selection: Selection) -> Self {
        Self {
            inner: Arc::new(ChangingInner {
                new_selection,
                prevented: AtomicBool::new(false),
                promise: Mutex::new(None),
                deferred: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The candidate that will be committed.
    pub fn new_selection(&self) -> &Selection {
        &self.inner.new_selection
    }

    /// Vetoes the change.
    pub fn prevent_default(&self) {
        self.inner.prevented.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once the change has been vetoed.
    pub fn is_default_prevented(&self) -> bool {
        self.inner.prevented.load(Ordering::SeqCst)
    }

    /// Supplies an asynchronous verdict. A later call replaces an earlier one.
    pub fn set_promise<F>(&self, decision: F)
    where
        F: Future<Output = ChangeDecision> + Send + 'static,
    {
        *self.inner.promise.lock() = Some(decision.boxed());
    }

    /// Registers work (typically a mutation of the candidate) that must finish
    /// before the change is decided. A failure fails the whole mutation.
    pub fn defer<F>(&self, work: F)
    where
        F: Future<Output = SelectionResult<()>> + Send + 'static,
    {
        self.inner.deferred.lock().push(work.boxed());
    }

    async fn decide(&self) -> SelectionResult<ChangeDecision> {
        loop {
            let batch = std::mem::take(&mut *self.inner.deferred.lock());
            if batch.is_empty() {
                break;
            }
            for work in batch {
                work.await?;
            }
        }
        if self.is_default_prevented() {
            return Ok(ChangeDecision::Veto);
        }
        let promise = self.inner.promise.lock().take();
        if let Some(promise) = promise
            && promise.await == ChangeDecision::Veto
        {
            return Ok(ChangeDecision::Veto);
        }
        if self.is_default_prevented() {
            return Ok(ChangeDecision::Veto);
        }
        Ok(ChangeDecision::Proceed)
    }
}

impl std::fmt::Debug for SelectionChanging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionChanging")
            .field("new_selection", &self.inner.new_selection)
            .field("prevented", &self.is_default_prevented())
            .finish()
    }
}

/// A queued manager mutation.
#[derive(Debug)]
enum Request {
    Set(Selector),
    Add(Selector),
    Remove(Selector),
    Clear,
    SelectAll,
}

impl Request {
    fn name(&self) -> &'static str {
        match self {
            Self::Set(_) => "set",
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Clear => "clear",
            Self::SelectAll => "select_all",
        }
    }
}

struct ManagerInner {
    site: Arc<dyn ItemSource>,
    retain: Arc<RetainTable>,
    config: RwLock<SelectionConfig>,
    live: Selection,
    candidates: Mutex<Vec<(u64, Selection)>>,
    next_candidate: AtomicU64,
    /// Serializes edit application against commits.
    commit_lock: Mutex<()>,
    focus: Mutex<FocusedItem>,
    group_focus: Mutex<GroupFocusCache>,
    version: AtomicU64,
    reload_epoch: AtomicU64,
    queue: SerialQueue,
    view: RwLock<Option<Arc<dyn SelectionView>>>,
    edit_connection: Mutex<Option<ConnectionGuard<SourceEdit>>>,
    disposed: AtomicBool,
    selection_changing: Signal<SelectionChanging>,
    selection_changed: Signal<SelectionSnapshot>,
}

/// Removes a candidate from the edit fan-out when its mutation ends.
struct CandidateRegistration<'a> {
    inner: &'a ManagerInner,
    id: u64,
}

impl Drop for CandidateRegistration<'_> {
    fn drop(&mut self) {
        self.inner
            .candidates
            .lock()
            .retain(|(id, _)| *id != self.id);
    }
}

/// Selection policy and change notification over an item source.
///
/// Dropping the manager disposes it.
pub struct SelectionManager {
    inner: Arc<ManagerInner>,
}

impl SelectionManager {
    /// Creates a manager over `site` with the default configuration.
    pub fn new(site: Arc<dyn ItemSource>) -> Self {
        Self::with_config(site, SelectionConfig::default())
    }

    /// Creates a manager over `site` and subscribes to its edit stream.
    pub fn with_config(site: Arc<dyn ItemSource>, config: SelectionConfig) -> Self {
        let retain = RetainTable::new();
        let live = Selection::with_config(site.clone(), config.clone(), retain.clone());
        let inner = Arc::new(ManagerInner {
            site: site.clone(),
            retain,
            config: RwLock::new(config),
            live,
            candidates: Mutex::new(Vec::new()),
            next_candidate: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            focus: Mutex::new(FocusedItem::default()),
            group_focus: Mutex::new(GroupFocusCache::new()),
            version: AtomicU64::new(0),
            reload_epoch: AtomicU64::new(0),
            queue: SerialQueue::new(),
            view: RwLock::new(None),
            edit_connection: Mutex::new(None),
            disposed: AtomicBool::new(false),
            selection_changing: Signal::new(),
            selection_changed: Signal::new(),
        });

        let weak: Weak<ManagerInner> = Arc::downgrade(&inner);
        let guard = site.notifications().connect_scoped(move |edit| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_edit(edit);
            }
        });
        *inner.edit_connection.lock() = Some(guard);

        selection_debug!(mode = ?inner.config.read().mode, "selection manager created");
        Self { inner }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// The current configuration.
    pub fn config(&self) -> SelectionConfig {
        self.inner.config.read().clone()
    }

    /// The current selection mode.
    pub fn selection_mode(&self) -> SelectionMode {
        self.inner.config.read().mode
    }

    /// Changes the selection mode.
    ///
    /// The existing selection is kept; later mutations follow the new mode.
    pub fn set_selection_mode(&self, mode: SelectionMode) {
        self.inner.config.write().mode = mode;
    }

    /// Installs the view hook called after every commit.
    pub fn set_view(&self, view: Arc<dyn SelectionView>) {
        *self.inner.view.write() = Some(view);
    }

    /// Removes the view hook.
    pub fn clear_view(&self) {
        *self.inner.view.write() = None;
    }

    // =========================================================================
    // Signals
    // =========================================================================

    /// Emitted with the candidate before every change is committed.
    pub fn selection_changing(&self) -> &Signal<SelectionChanging> {
        &self.inner.selection_changing
    }

    /// Emitted with the new state after every commit.
    pub fn selection_changed(&self) -> &Signal<SelectionSnapshot> {
        &self.inner.selection_changed
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Replaces the selection.
    pub fn set(&self, selector: impl Into<Selector>) -> BoxFuture<'static, SelectionResult<ChangeOutcome>> {
        self.submit(Request::Set(selector.into()))
    }

    /// Adds to the selection. In single mode this behaves like [`set`](Self::set).
    pub fn add(&self, selector: impl Into<Selector>) -> BoxFuture<'static, SelectionResult<ChangeOutcome>> {
        self.submit(Request::Add(selector.into()))
    }

    /// Removes from the selection.
    pub fn remove(&self, selector: impl Into<Selector>) -> BoxFuture<'static, SelectionResult<ChangeOutcome>> {
        self.submit(Request::Remove(selector.into()))
    }

    /// Clears the selection. Allowed in every mode.
    pub fn clear(&self) -> BoxFuture<'static, SelectionResult<ChangeOutcome>> {
        self.submit(Request::Clear)
    }

    /// Selects every current and future item. Only allowed in multi mode.
    pub fn select_all(&self) -> BoxFuture<'static, SelectionResult<ChangeOutcome>> {
        self.submit(Request::SelectAll)
    }

    fn submit(&self, request: Request) -> BoxFuture<'static, SelectionResult<ChangeOutcome>> {
        let inner = self.inner.clone();
        let ticket = inner.queue.enqueue();
        let span = tracing::debug_span!(
            target: targets::MANAGER,
            span_names::MUTATION,
            request = request.name(),
            ticket = ticket.id().as_u64()
        );
        inner.run(ticket, request).instrument(span).boxed()
    }

    /// Fetches the item record of every selected index, ascending.
    ///
    /// Waits for every mutation issued before it.
    pub fn items(&self) -> BoxFuture<'static, SelectionResult<Vec<Item>>> {
        let inner = self.inner.clone();
        let mut ticket = inner.queue.enqueue();
        async move {
            ticket.wait_turn().await?;
            inner.live.items().await
        }
        .boxed()
    }

    /// Re-resolves every pinned endpoint and corrects drifted bounds.
    ///
    /// If that changes the selection, the change is announced like a commit
    /// through [`selection_changed`](Self::selection_changed) and the view.
    pub fn revalidate(&self) -> BoxFuture<'static, SelectionResult<()>> {
        let inner = self.inner.clone();
        let mut ticket = inner.queue.enqueue();
        async move {
            ticket.wait_turn().await?;
            let old = {
                let _commit = inner.commit_lock.lock();
                inner.snapshot()
            };
            inner.live.revalidate().await?;
            let new = {
                let _commit = inner.commit_lock.lock();
                if inner.is_disposed() {
                    return Ok(());
                }
                inner.version.fetch_add(1, Ordering::SeqCst);
                inner.snapshot()
            };
            if new.ranges != old.ranges || new.everything != old.everything {
                tracing::debug!(target: targets::MANAGER, ranges = ?new.ranges, "revalidation moved the selection");
                inner.announce(&old, &new);
            }
            Ok(())
        }
        .boxed()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of the selected ranges.
    pub fn ranges(&self) -> Vec<IndexRange> {
        self.inner.live.ranges()
    }

    /// Every selected index, ascending.
    pub fn indices(&self) -> SelectionResult<Vec<usize>> {
        self.inner.live.indices()
    }

    /// Number of selected items.
    pub fn count(&self) -> usize {
        self.inner.live.count()
    }

    /// Returns `true` if every item is selected.
    pub fn is_everything(&self) -> bool {
        self.inner.live.is_everything()
    }

    /// Returns `true` if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.inner.live.is_empty()
    }

    /// Returns `true` if `index` is selected.
    pub fn is_included(&self, index: usize) -> bool {
        self.inner.live.contains(index)
    }

    /// The committed state with the current version.
    pub fn snapshot(&self) -> SelectionSnapshot {
        self.inner.snapshot()
    }

    /// Incremented on every applied edit and every commit.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Number of mutations waiting or running.
    pub fn pending_mutations(&self) -> usize {
        self.inner.queue.pending_count()
    }

    /// The retain table behind every endpoint pin of this manager.
    pub fn retained_items(&self) -> Arc<RetainTable> {
        self.inner.retain.clone()
    }

    /// The item source this manager resolves against.
    pub fn site(&self) -> &Arc<dyn ItemSource> {
        &self.inner.site
    }

    // =========================================================================
    // Focus
    // =========================================================================

    /// The focused entry.
    pub fn focused(&self) -> FocusedItem {
        *self.inner.focus.lock()
    }

    /// Moves focus. Selection is not affected.
    pub fn set_focused(&self, focused: FocusedItem) {
        *self.inner.focus.lock() = focused;
    }

    /// Runs `f` against the per-group focus memory.
    ///
    /// The cache is locked while `f` runs and edits from the item source
    /// update the same cache, so `f` must not mutate the source.
    pub fn with_group_focus_cache<R>(&self, f: impl FnOnce(&mut GroupFocusCache) -> R) -> R {
        f(&mut self.inner.group_focus.lock())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Disconnects from the source and releases every retained item.
    ///
    /// Queued and in-flight mutations settle as
    /// [`ChangeOutcome::Abandoned`]. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Returns `true` once the manager has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for SelectionManager {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for SelectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionManager")
            .field("selection", &self.inner.live)
            .field("version", &self.version())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ManagerInner {
    async fn run(self: Arc<Self>, mut ticket: QueueTicket, request: Request) -> SelectionResult<ChangeOutcome> {
        if ticket.wait_turn().await.is_err() || self.is_disposed() {
            return Ok(ChangeOutcome::Abandoned);
        }

        let mode = self.config.read().mode;
        let request = match request {
            Request::Clear => Request::Clear,
            _ if !mode.allows_selection() => {
                tracing::debug!(target: targets::MANAGER, "selection is disabled");
                return Ok(ChangeOutcome::NotAllowed);
            }
            Request::SelectAll if !mode.is_multi() => {
                tracing::debug!(target: targets::MANAGER, "select all needs multi selection");
                return Ok(ChangeOutcome::NotAllowed);
            }
            Request::Add(selector) if !mode.is_multi() => Request::Set(selector),
            request => request,
        };

        // Edits fan out under the commit lock, so the copy and its
        // registration must not be split by one.
        let (epoch, candidate, _registration) = {
            let _commit = self.commit_lock.lock();
            let candidate = self.live.detached_copy();
            let registration = self.register_candidate(&candidate);
            (self.reload_epoch.load(Ordering::SeqCst), candidate, registration)
        };

        let applied = match request {
            Request::Set(selector) => candidate.set(selector).await,
            Request::Add(selector) => candidate.add(selector).await,
            Request::Remove(selector) => candidate.remove(selector).await,
            Request::Clear => candidate.clear().await,
            Request::SelectAll => candidate.select_all().await,
        };
        if let Err(err) = applied {
            if self.is_disposed() {
                return Ok(ChangeOutcome::Abandoned);
            }
            selection_warn!(error = %err, "mutation failed");
            return Err(err);
        }
        if self.overtaken(epoch) {
            return Ok(ChangeOutcome::Abandoned);
        }
        if !mode.is_multi() {
            candidate.with_state(|state| state.retain_lowest());
        }

        let event = SelectionChanging::new(candidate.clone());
        self.selection_changing.emit(event.clone());
        let decision = event.decide().await?;
        drop(event);
        if decision == ChangeDecision::Veto {
            tracing::debug!(target: targets::MANAGER, "change vetoed");
            return Ok(ChangeOutcome::Vetoed);
        }
        if self.overtaken(epoch) {
            return Ok(ChangeOutcome::Abandoned);
        }
        if !mode.is_multi() {
            candidate.with_state(|state| state.retain_lowest());
        }

        let (old, new) = {
            let _commit = self.commit_lock.lock();
            let _perf = PerfSpan::new("commit");
            if self.is_disposed() {
                return Ok(ChangeOutcome::Abandoned);
            }
            let old = self.snapshot();
            let previous = self.live.replace_state(candidate.take_state());
            self.version.fetch_add(1, Ordering::SeqCst);
            drop(previous);
            (old, self.snapshot())
        };
        tracing::debug!(
            target: targets::MANAGER,
            ranges = ?new.ranges,
            everything = new.everything,
            version = new.version,
            "selection committed"
        );

        self.announce(&old, &new);
        Ok(ChangeOutcome::Committed)
    }

    /// Tells listeners and the view that the live selection went from `old`
    /// to `new`.
    fn announce(&self, old: &SelectionSnapshot, new: &SelectionSnapshot) {
        self.selection_changed.emit(new.clone());
        let view = self.view.read().clone();
        if let Some(view) = view {
            view.update_selection(old, new);
        }
    }

    fn register_candidate(&self, candidate: &Selection) -> CandidateRegistration<'_> {
        let id = self.next_candidate.fetch_add(1, Ordering::Relaxed);
        self.candidates.lock().push((id, candidate.clone()));
        CandidateRegistration { inner: self, id }
    }

    fn overtaken(&self, epoch: u64) -> bool {
        let overtaken = self.is_disposed() || self.reload_epoch.load(Ordering::SeqCst) != epoch;
        if overtaken {
            tracing::debug!(target: targets::MANAGER, "mutation overtaken by reload or disposal");
        }
        overtaken
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            ranges: self.live.ranges(),
            everything: self.live.is_everything(),
            count: self.live.count(),
            version: self.version.load(Ordering::SeqCst),
        }
    }

    fn apply_edit(&self, edit: &SourceEdit) {
        if self.is_disposed() {
            return;
        }
        if let SourceEdit::Removed { mirage: true, .. } = edit {
            selection_trace!(index = ?EditKind::index_of(edit), "ignoring mirage removal");
            return;
        }
        let _span = tracing::trace_span!(target: targets::MANAGER, span_names::EDIT, edit = ?EditKind::of(edit)).entered();

        let _commit = self.commit_lock.lock();
        self.live.apply_edit(edit);
        for (_, candidate) in self.candidates.lock().iter() {
            candidate.apply_edit(edit);
        }

        match edit {
            SourceEdit::Inserted { index, .. } => {
                self.focus.lock().on_inserted(*index);
                self.group_focus.lock().on_inserted(*index);
            }
            SourceEdit::Removed { item, index, .. } => {
                let remaining = self.live.extent();
                self.focus.lock().on_removed(*index, remaining);
                self.group_focus.lock().on_removed(&item.key, *index);
            }
            SourceEdit::Moved {
                item,
                old_index,
                new_index,
            } => {
                self.focus.lock().on_moved(*old_index, *new_index);
                self.group_focus
                    .lock()
                    .on_moved(&item.key, *old_index, *new_index);
            }
            SourceEdit::CountChanged { new_count, .. } => {
                self.focus.lock().clamp_to(*new_count);
            }
            SourceEdit::Changed { .. } => {}
            SourceEdit::Reload => {
                *self.focus.lock() = FocusedItem::default();
                self.group_focus.lock().clear();
                self.reload_epoch.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(target: targets::MANAGER, "source reloaded, selection reset");
            }
        }
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.close();
        if let Some(guard) = self.edit_connection.lock().take() {
            // The source may already be gone; either way the slot is released.
            let _ = guard.disconnect();
        }
        {
            let _commit = self.commit_lock.lock();
            self.live.shut_down();
            for (_, candidate) in self.candidates.lock().iter() {
                candidate.shut_down();
            }
        }
        self.group_focus.lock().clear();
        *self.focus.lock() = FocusedItem::default();
        tracing::debug!(
            target: targets::MANAGER,
            retained = self.retain.total(),
            "selection manager disposed"
        );
    }
}

/// Field-free edit label for tracing.
#[derive(Debug)]
enum EditKind {
    Inserted,
    Removed,
    Moved,
    Changed,
    CountChanged,
    Reload,
}

impl EditKind {
    fn index_of(edit: &SourceEdit) -> Option<usize> {
        match edit {
            SourceEdit::Inserted { index, .. }
            | SourceEdit::Removed { index, .. }
            | SourceEdit::Changed { index, .. } => Some(*index),
            SourceEdit::Moved { old_index, .. } => Some(*old_index),
            SourceEdit::CountChanged { .. } | SourceEdit::Reload => None,
        }
    }

    fn of(edit: &SourceEdit) -> Self {
        match edit {
            SourceEdit::Inserted { .. } => Self::Inserted,
            SourceEdit::Removed { .. } => Self::Removed,
            SourceEdit::Moved { .. } => Self::Moved,
            SourceEdit::Changed { .. } => Self::Changed,
            SourceEdit::CountChanged { .. } => Self::CountChanged,
            SourceEdit::Reload => Self::Reload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryItemSource;
    use std::sync::atomic::AtomicUsize;

    fn manager(config: SelectionConfig) -> (Arc<MemoryItemSource>, SelectionManager) {
        let source = Arc::new(MemoryItemSource::alphabet());
        let manager = SelectionManager::with_config(source.clone(), config);
        (source, manager)
    }

    #[tokio::test]
    async fn test_none_mode_rejects_all_but_clear() {
        let (_source, manager) = manager(SelectionConfig::default().with_mode(SelectionMode::None));
        assert_eq!(manager.set(1usize).await, Ok(ChangeOutcome::NotAllowed));
        assert_eq!(manager.select_all().await, Ok(ChangeOutcome::NotAllowed));
        assert_eq!(manager.clear().await, Ok(ChangeOutcome::Committed));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_single_mode_collapses() {
        let (_source, manager) = manager(SelectionConfig::default().with_mode(SelectionMode::Single));
        manager.set(vec![7usize, 3, 9]).await.unwrap();
        assert_eq!(manager.indices().unwrap(), vec![3]);

        manager.add(12usize).await.unwrap();
        assert_eq!(manager.indices().unwrap(), vec![12]);
    }

    #[tokio::test]
    async fn test_prevent_default_vetoes() {
        let (_source, manager) = manager(SelectionConfig::default());
        manager.set(2usize).await.unwrap();

        manager.selection_changing().connect(|event| event.prevent_default());
        assert_eq!(manager.set(5usize).await, Ok(ChangeOutcome::Vetoed));
        assert_eq!(manager.indices().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_changed_signal_and_view() {
        struct CountingView(AtomicUsize);
        impl SelectionView for CountingView {
            fn update_selection(&self, old: &SelectionSnapshot, new: &SelectionSnapshot) {
                assert!(new.version > old.version);
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let (_source, manager) = manager(SelectionConfig::default());
        let view = Arc::new(CountingView(AtomicUsize::new(0)));
        manager.set_view(view.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        manager
            .selection_changed()
            .connect(move |snapshot| seen_clone.lock().push(snapshot.ranges.clone()));

        manager.set(1usize..=2).await.unwrap();
        manager.add(4usize).await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                vec![IndexRange::new(1, 2)],
                vec![IndexRange::new(1, 2), IndexRange::new(4, 4)],
            ]
        );
        assert_eq!(view.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_drop_releases_pins() {
        let (_source, manager) = manager(SelectionConfig::default());
        manager.set(vec![1usize, 5, 9]).await.unwrap();
        let retain = manager.retained_items();
        assert_eq!(retain.total(), 3);

        drop(manager);
        assert_eq!(retain.total(), 0);
    }
}
