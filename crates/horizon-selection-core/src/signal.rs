//! Signal/slot system for Horizon Selection.
//!
//! Signals carry change notifications between the selection engine, the item
//! source that backs it and whatever view renders it. A signal owns a set of
//! slots (callbacks); emitting the signal invokes every connected slot in
//! connection order on the emitting thread.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - A broadcast point for one kind of notification
//! - [`ConnectionId`] - Handle naming one connected slot
//! - [`ConnectionGuard`] - Scoped connection, removed when the guard goes away
//!
//! # Re-entrancy
//!
//! Slots are invoked after the connection table lock has been released, so a
//! slot may connect or disconnect slots (including itself) on the same signal.
//! Connections made during an emission take effect from the next emission.
//!
//! # Example
//!
//! ```
//! use horizon_selection_core::Signal;
//!
//! let edits = Signal::<String>::new();
//!
//! let conn_id = edits.connect(|edit| {
//!     println!("Edit received: {}", edit);
//! });
//!
//! edits.emit("inserted".to_string());
//! edits.disconnect(conn_id);
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::error::{CoreError, CoreResult};
use crate::logging::{span_names, targets};

new_key_type! {
    /// Handle naming one slot connected to a [`Signal`].
    ///
    /// Pass it to [`Signal::disconnect`] to remove that slot. Stale handles are
    /// harmless: disconnecting one simply reports `false`.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;
type ConnectionTable<Args> = Mutex<SlotMap<ConnectionId, Slot<Args>>>;

/// A broadcast point that fans one notification out to any number of slots.
///
/// `Args` is the payload handed to each slot by reference, e.g. an item
/// source edit or a selection-changing event. Use `()` for bare pings.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync` and can be shared between threads. Slots
/// run on whichever thread calls [`emit`](Self::emit).
pub struct Signal<Args> {
    /// All active connections, shared with outstanding [`ConnectionGuard`]s.
    connections: Arc<ConnectionTable<Args>>,
}

impl<Args: Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Send + 'static> Signal<Args> {
    /// An unconnected signal.
    pub fn new() -> Self {
        Self {
            connections: Arc::new(Mutex::new(SlotMap::with_key())),
        }
    }

    /// Attach `slot`; it runs on every subsequent emission until disconnected.
    ///
    /// # Example
    ///
    /// ```
    /// use horizon_selection_core::Signal;
    ///
    /// let signal = Signal::<usize>::new();
    /// let id = signal.connect(|index| println!("Removed index {}", index));
    /// signal.emit(3);
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Like [`connect`](Self::connect), but the slot lives only as long as the
    /// returned guard.
    ///
    /// The guard only holds a weak reference to the connection table, so it may
    /// safely outlive the signal.
    pub fn connect_scoped<F>(&self, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            connections: Arc::downgrade(&self.connections),
            id: Some(id),
        }
    }

    /// Remove the slot named by `id`. Returns whether anything was removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Slots currently attached.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Emit the signal, invoking all connected slots in connection order.
    pub fn emit(&self, args: Args) {
        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        let _span = tracing::trace_span!(
            target: targets::SIGNAL,
            span_names::SIGNAL,
            connection_count = slots.len()
        )
        .entered();

        for slot in slots {
            slot(&args);
        }
    }
}

/// Scoped connection returned by [`Signal::connect_scoped`].
///
/// Dropping the guard removes the slot; a selection holds one of these on its
/// item source so that edits stop flowing once the selection is gone.
///
/// # Example
///
/// ```
/// use horizon_selection_core::Signal;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let inserted = Signal::<usize>::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// {
///     let seen = seen.clone();
///     let _guard = inserted.connect_scoped(move |_| {
///         seen.fetch_add(1, Ordering::SeqCst);
///     });
///     inserted.emit(4);
/// }
/// inserted.emit(5);
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub struct ConnectionGuard<Args> {
    connections: Weak<ConnectionTable<Args>>,
    id: Option<ConnectionId>,
}

impl<Args> ConnectionGuard<Args> {
    /// The ID of the guarded connection, if it is still held.
    pub fn id(&self) -> Option<ConnectionId> {
        self.id
    }

    /// Disconnect now, reporting why the disconnect could not happen.
    pub fn disconnect(mut self) -> CoreResult<()> {
        self.release()
    }

    fn release(&mut self) -> CoreResult<()> {
        let id = self.id.take().ok_or(CoreError::InvalidConnection)?;
        let connections = self.connections.upgrade().ok_or(CoreError::SignalDropped)?;
        let removed = connections.lock().remove(id);
        removed.map(|_| ()).ok_or(CoreError::InvalidConnection)
    }
}

impl<Args> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if self.id.is_some() {
            let _ = self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum Edit {
        Inserted(usize),
        Removed(usize),
    }

    fn recorder() -> (Arc<Mutex<Vec<Edit>>>, impl Fn(&Edit) + Send + Sync + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |edit: &Edit| sink.lock().push(edit.clone()))
    }

    #[test]
    fn test_edits_reach_every_slot() {
        let edits = Signal::<Edit>::new();
        let (first, first_slot) = recorder();
        let (second, second_slot) = recorder();
        edits.connect(first_slot);
        edits.connect(second_slot);

        edits.emit(Edit::Inserted(3));
        edits.emit(Edit::Removed(0));

        let expected = vec![Edit::Inserted(3), Edit::Removed(0)];
        assert_eq!(*first.lock(), expected);
        assert_eq!(*second.lock(), expected);
    }

    #[test]
    fn test_disconnected_slot_stops_receiving() {
        let edits = Signal::<Edit>::new();
        let (log, slot) = recorder();
        let id = edits.connect(slot);

        edits.emit(Edit::Inserted(1));
        assert!(edits.disconnect(id));
        assert!(!edits.disconnect(id), "second disconnect is a no-op");
        edits.emit(Edit::Inserted(2));

        assert_eq!(*log.lock(), vec![Edit::Inserted(1)]);
    }

    #[test]
    fn test_slots_run_in_connection_order() {
        let signal = Signal::<()>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..4 {
            let order = order.clone();
            signal.connect(move |_| order.lock().push(n));
        }

        signal.emit(());
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_slot_can_disconnect_itself() {
        let signal = Arc::new(Signal::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let signal_clone = Arc::downgrade(&signal);
        let calls_clone = calls.clone();
        let own_id_clone = own_id.clone();
        let id = signal.connect(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            if let (Some(signal), Some(id)) = (signal_clone.upgrade(), *own_id_clone.lock()) {
                signal.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        signal.emit(());
        signal.emit(());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_scoped_connection_ends_with_guard() {
        let edits = Signal::<Edit>::new();
        let (log, slot) = recorder();

        let guard = edits.connect_scoped(slot);
        edits.emit(Edit::Inserted(0));
        assert_eq!(edits.connection_count(), 1);
        drop(guard);
        edits.emit(Edit::Inserted(1));

        assert_eq!(edits.connection_count(), 0);
        assert_eq!(*log.lock(), vec![Edit::Inserted(0)]);
    }

    #[test]
    fn test_guard_outlives_signal() {
        let signal = Signal::<i32>::new();
        let guard = signal.connect_scoped(|_| {});
        drop(signal);

        assert_eq!(guard.disconnect(), Err(CoreError::SignalDropped));
    }

    #[test]
    fn test_guard_explicit_disconnect_after_manual_disconnect() {
        let signal = Signal::<i32>::new();
        let guard = signal.connect_scoped(|_| {});
        let id = guard.id().unwrap();

        assert!(signal.disconnect(id));
        assert_eq!(guard.disconnect(), Err(CoreError::InvalidConnection));
    }

    #[test]
    fn test_emit_from_multiple_threads() {
        let signal = Arc::new(Signal::<usize>::new());
        let delivered = Arc::new(AtomicUsize::new(0));

        let sink = delivered.clone();
        signal.connect(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let signal = signal.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        signal.emit(i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(delivered.load(Ordering::SeqCst), 80);
    }
}
