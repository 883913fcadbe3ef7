//! Serial task queue for ordered asynchronous work.
//!
//! A [`SerialQueue`] hands out [`QueueTicket`]s in call order. A ticket holder
//! awaits [`QueueTicket::wait_turn`] before doing its work and releases the
//! turn by dropping the ticket. Tickets dropped before their turn are skipped,
//! so a caller that abandons its future never stalls the queue.
//!
//! The ticket is taken synchronously, which is what lets an API method that
//! returns a lazy future still guarantee FIFO application: the position in the
//! queue is fixed when the method is called, not when the future is first
//! polled.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{CoreError, CoreResult};
use crate::logging::targets;

/// A unique identifier for a queued unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw u64 value of this task ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Global counter for generating unique queue identities in logs.
static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Internal queue bookkeeping.
#[derive(Debug)]
struct QueueState {
    /// The ticket currently allowed to run.
    serving: u64,
    /// The next ticket number to hand out.
    next: u64,
    /// Tickets released before their turn came up.
    abandoned: BTreeSet<u64>,
    /// Set once the queue is closed; waiting tickets fail.
    closed: bool,
}

#[derive(Debug)]
struct QueueShared {
    id: u64,
    state: Mutex<QueueState>,
    turn_changed: Notify,
}

impl QueueShared {
    fn finish(&self, ticket: u64) {
        let mut state = self.state.lock();
        if state.serving == ticket {
            state.serving += 1;
            loop {
                let serving = state.serving;
                if !state.abandoned.remove(&serving) {
                    break;
                }
                state.serving += 1;
            }
            drop(state);
            tracing::trace!(target: targets::TASK, queue = self.id, ticket, "turn released");
            self.turn_changed.notify_waiters();
        } else if ticket > state.serving {
            state.abandoned.insert(ticket);
            tracing::trace!(target: targets::TASK, queue = self.id, ticket, "ticket abandoned");
        }
    }
}

/// FIFO queue serializing asynchronous work items.
///
/// Cloning a `SerialQueue` yields another handle to the same queue.
#[derive(Debug, Clone)]
pub struct SerialQueue {
    shared: Arc<QueueShared>,
}

impl SerialQueue {
    /// Create a new, empty queue.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(QueueShared {
                id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(QueueState {
                    serving: 0,
                    next: 0,
                    abandoned: BTreeSet::new(),
                    closed: false,
                }),
                turn_changed: Notify::new(),
            }),
        }
    }

    /// Take the next ticket.
    ///
    /// The ticket's position is fixed now; its turn comes once every earlier
    /// ticket has been dropped.
    pub fn enqueue(&self) -> QueueTicket {
        let mut state = self.shared.state.lock();
        let ticket = state.next;
        state.next += 1;
        QueueTicket {
            shared: self.shared.clone(),
            ticket,
        }
    }

    /// Number of tickets handed out and not yet released.
    pub fn pending_count(&self) -> usize {
        let state = self.shared.state.lock();
        let outstanding = state.next - state.serving;
        let abandoned = state.abandoned.len() as u64;
        (outstanding - abandoned) as usize
    }

    /// Returns `true` if no ticket is outstanding.
    pub fn is_idle(&self) -> bool {
        self.pending_count() == 0
    }

    /// Close the queue.
    ///
    /// Every ticket still waiting for its turn, and every ticket taken later,
    /// fails with [`CoreError::QueueClosed`]. A ticket already holding its turn
    /// keeps it until dropped.
    pub fn close(&self) {
        self.shared.state.lock().closed = true;
        tracing::debug!(target: targets::TASK, queue = self.shared.id, "queue closed");
        self.shared.turn_changed.notify_waiters();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A position in a [`SerialQueue`].
///
/// Dropping the ticket releases the turn (or, if the turn has not come yet,
/// marks the position as skipped).
#[derive(Debug)]
#[must_use = "dropping a ticket immediately gives up its place in the queue"]
pub struct QueueTicket {
    shared: Arc<QueueShared>,
    ticket: u64,
}

impl QueueTicket {
    /// The identifier of this ticket.
    pub fn id(&self) -> TaskId {
        TaskId(self.ticket)
    }

    /// Wait until every earlier ticket has been released.
    pub async fn wait_turn(&mut self) -> CoreResult<()> {
        loop {
            let notified = self.shared.turn_changed.notified();
            {
                let state = self.shared.state.lock();
                if state.closed {
                    return Err(CoreError::QueueClosed);
                }
                if state.serving == self.ticket {
                    return Ok(());
                }
            }
            notified.await;
        }
    }
}

impl Drop for QueueTicket {
    fn drop(&mut self) {
        self.shared.finish(self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_turns_follow_enqueue_order() {
        let queue = SerialQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut futures = Vec::new();
        for n in 0..5u64 {
            let mut ticket = queue.enqueue();
            let order = order.clone();
            futures.push(async move {
                ticket.wait_turn().await.unwrap();
                // Later tickets sleep less, so without the queue they would finish first.
                tokio::time::sleep(Duration::from_millis(5 * (5 - n))).await;
                order.lock().push(n);
            });
        }

        // Drive them all concurrently, in reverse.
        let handles: Vec<_> = futures.into_iter().rev().map(tokio::spawn).collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_abandoned_ticket_is_skipped() {
        let queue = SerialQueue::new();
        let mut first = queue.enqueue();
        let second = queue.enqueue();
        let mut third = queue.enqueue();

        assert_eq!(queue.pending_count(), 3);
        drop(second);
        assert_eq!(queue.pending_count(), 2);

        first.wait_turn().await.unwrap();
        drop(first);

        tokio::time::timeout(Duration::from_secs(1), third.wait_turn())
            .await
            .expect("third ticket should not wait on the abandoned one")
            .unwrap();
        drop(third);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let queue = SerialQueue::new();
        let mut first = queue.enqueue();
        let mut second = queue.enqueue();

        first.wait_turn().await.unwrap();
        queue.close();

        assert_eq!(second.wait_turn().await, Err(CoreError::QueueClosed));
        assert!(queue.is_closed());

        let mut late = queue.enqueue();
        assert_eq!(late.wait_turn().await, Err(CoreError::QueueClosed));
    }

    #[test]
    fn test_ticket_ids_increase() {
        let queue = SerialQueue::new();
        let a = queue.enqueue();
        let b = queue.enqueue();
        assert!(a.id() < b.id());
        assert_eq!(b.id().as_u64(), a.id().as_u64() + 1);
    }
}
