//! Item records produced by an item source.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

/// Global counter for generating unique item handles.
static NEXT_ITEM_HANDLE: AtomicU64 = AtomicU64::new(1);

/// The identity of an item as assigned by its source.
///
/// Handles survive index shifts; a replaced item (see
/// [`SourceEdit::Changed`](crate::source::SourceEdit::Changed)) gets a new handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemHandle(u64);

impl ItemHandle {
    /// Allocates a fresh, process-unique handle.
    pub fn next() -> Self {
        Self(NEXT_ITEM_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value of this handle.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single item: identity, stable key and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    /// Source-assigned identity.
    pub handle: ItemHandle,
    /// Stable key used by key-based selectors.
    pub key: String,
    /// Arbitrary item payload.
    pub data: Value,
}

impl ItemRecord {
    /// Creates a record with a freshly allocated handle.
    pub fn new(key: impl Into<String>, data: Value) -> Self {
        Self {
            handle: ItemHandle::next(),
            key: key.into(),
            data,
        }
    }
}

/// Shared handle to an [`ItemRecord`].
pub type Item = Arc<ItemRecord>;
