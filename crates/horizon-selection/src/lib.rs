//! Horizon Selection - selection ranges for virtualized list views.
//!
//! This crate tracks which items of a list are selected when the list itself
//! is never fully loaded: items live behind an asynchronous [`ItemSource`],
//! and the selection is kept as sorted index ranges whose endpoints are pinned
//! to their items so the ranges survive inserts, removals and moves.
//!
//! # Modules
//!
//! - [`model`]: Ranges, selections, the selection manager and focus tracking
//! - [`source`]: The item source contract and an in-memory implementation
//! - [`config`]: Selection mode and tunables, loadable from TOML
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_selection::model::{IndexRange, SelectionManager};
//! use horizon_selection::source::MemoryItemSource;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let source = Arc::new(MemoryItemSource::alphabet());
//! let manager = SelectionManager::new(source.clone());
//!
//! manager.set("c").await.unwrap();
//! manager.add(5usize..=7).await.unwrap();
//! assert_eq!(manager.ranges(), vec![IndexRange::new(2, 2), IndexRange::new(5, 7)]);
//!
//! // Inserting in front of the selection shifts it.
//! source.insert(0, "zero");
//! assert_eq!(manager.ranges(), vec![IndexRange::new(3, 3), IndexRange::new(6, 8)]);
//! # });
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod source;

pub use config::{SelectionConfig, SelectionMode};
pub use error::{SelectionError, SelectionResult, SourceError, SourceResult};
pub use model::{
    ChangeOutcome, IndexRange, Item, ItemRecord, Selection, SelectionManager, Selector,
};
pub use source::{ItemSource, SourceEdit};

pub use horizon_selection_core::{ConnectionGuard, ConnectionId, Signal, logging};
