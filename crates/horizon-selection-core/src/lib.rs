//! Core systems for Horizon Selection.
//!
//! This crate provides the building blocks shared by the selection engine:
//!
//! - **Signal/Slot System**: Type-safe change and edit notifications
//! - **Serial Queue**: FIFO ordering for asynchronous mutations
//! - **Logging**: Tracing targets, span names and helper macros
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_selection_core::Signal;
//!
//! let count_changed = Signal::<usize>::new();
//!
//! let conn_id = count_changed.connect(|count| {
//!     println!("Count is now {}", count);
//! });
//!
//! count_changed.emit(42);
//! count_changed.disconnect(conn_id);
//! ```
//!
//! # Serial Queue Example
//!
//! ```
//! use horizon_selection_core::SerialQueue;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let queue = SerialQueue::new();
//!
//! // Tickets are handed out in call order...
//! let mut first = queue.enqueue();
//! let mut second = queue.enqueue();
//!
//! // ...and turns are granted in the same order.
//! first.wait_turn().await.unwrap();
//! drop(first);
//! second.wait_turn().await.unwrap();
//! # });
//! ```

mod error;
pub mod logging;
pub mod signal;
mod task;

pub use error::{CoreError, CoreResult};
pub use logging::PerfSpan;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use task::{QueueTicket, SerialQueue, TaskId};
