//! Error types for the selection engine.

use horizon_selection_core::CoreError;
use thiserror::Error;

/// Errors reported by an item source while fetching items or counts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The requested key or index does not name an item.
    #[error("item does not exist")]
    DoesNotExist,

    /// The backing store did not answer.
    #[error("item source did not respond")]
    NoResponse,

    /// Any other backing-store failure.
    #[error("item source failure: {0}")]
    Failed(String),
}

impl SourceError {
    /// Returns `true` if the error only means "no such item".
    ///
    /// Such failures degrade the offending selector element to a no-op instead
    /// of failing the whole operation.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::DoesNotExist)
    }
}

/// Result type for item source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur during selection operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// The item source failed while resolving a selector.
    #[error("item source error: {0}")]
    Source(#[from] SourceError),

    /// The operation needs the item count, which has not been resolved.
    #[error("item count has not been resolved")]
    CountUnresolved,

    /// The owning selection manager has been disposed.
    #[error("selection manager has been disposed")]
    Disposed,

    /// The configuration could not be parsed.
    #[error("invalid selection configuration: {0}")]
    Config(String),

    /// A signal or queue primitive failed.
    #[error("core error: {0}")]
    Core(CoreError),
}

impl From<CoreError> for SelectionError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::QueueClosed => Self::Disposed,
            other => Self::Core(other),
        }
    }
}

/// Result type for selection operations.
pub type SelectionResult<T> = Result<T, SelectionError>;
