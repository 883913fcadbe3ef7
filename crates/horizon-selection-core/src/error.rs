//! Error types for Horizon Selection core systems.

use thiserror::Error;

/// Errors raised by the signal and queue primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The connection ID is invalid or has already been disconnected.
    #[error("invalid or disconnected connection ID")]
    InvalidConnection,

    /// The signal has been dropped and is no longer available.
    #[error("signal has been dropped")]
    SignalDropped,

    /// The queue was closed before the ticket's turn came up.
    #[error("serial queue has been closed")]
    QueueClosed,
}

/// A specialized Result type for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
