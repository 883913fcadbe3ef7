//! Selection model for virtualized lists.
//!
//! The types here keep track of which items of a (possibly huge, possibly
//! remote) list are selected, without ever materializing the list itself.
//!
//! # Core Types
//!
//! - `IndexRange`: An inclusive run of item indices
//! - `Selector`: Anything that can describe items to select (index, key, range, list)
//! - `RangeSet`: Sorted, disjoint, non-adjacent ranges with optional endpoint pins
//! - `Selection`: A range set resolved asynchronously against an item source
//! - `SelectionManager`: Mode gating, change notification and edit reconciliation
//!
//! # Supporting Types
//!
//! - `RetainTable` / `RetainedItem`: Reference-counted pins on endpoint items
//! - `FocusedItem` / `GroupFocusCache`: Keyboard focus that follows list edits
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────┐  candidate  ┌─────────────┐  resolve  ┌────────────┐
//! │ SelectionManager │────────────>│  Selection  │──────────>│ ItemSource │
//! │  (mode, signals) │<────────────│ (RangeSet)  │           │            │
//! └──────────────────┘   commit    └─────────────┘           └────────────┘
//!          ^                                                       │
//!          └──────────────────── SourceEdit ───────────────────────┘
//! ```

mod focus;
mod index;
mod item;
mod manager;
mod range_set;
mod retain;
mod selection;
mod selector;

pub use focus::{FocusKind, FocusedItem, GroupFocusCache};
pub use index::IndexRange;
pub use item::{Item, ItemHandle, ItemRecord};
pub use manager::{
    ChangeDecision, ChangeOutcome, SelectionChanging, SelectionManager, SelectionSnapshot,
    SelectionView,
};
pub use range_set::{EndpointPin, PinnedRange, RangeSet};
pub use retain::{RetainTable, RetainedItem};
pub use selection::Selection;
pub use selector::Selector;
