//! Logging and tracing facilities for Horizon Selection.
//!
//! Horizon Selection uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_selection=debug")
//!         .init();
//! }
//! ```
//!
//! The [`targets`] constants can be used in filter directives to narrow the
//! output to a single subsystem, e.g. `horizon_selection::manager=trace`.

/// Span names used throughout Horizon Selection for tracing.
pub mod span_names {
    /// A selection mutation (set/add/remove/clear/select-all).
    pub const MUTATION: &str = "horizon_selection::mutation";
    /// Selector resolution against the item source.
    pub const RESOLVE: &str = "horizon_selection::resolve";
    /// Reconciliation of an item source edit.
    pub const EDIT: &str = "horizon_selection::edit";
    /// Signal emission span.
    pub const SIGNAL: &str = "horizon_selection::signal";
}

/// Target names for log filtering.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_selection_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_selection_core::signal";
    /// Serial queue target.
    pub const TASK: &str = "horizon_selection_core::task";
    /// Range set target.
    pub const RANGE_SET: &str = "horizon_selection::range_set";
    /// Selector resolution target.
    pub const SELECTION: &str = "horizon_selection::selection";
    /// Selection manager target.
    pub const MANAGER: &str = "horizon_selection::manager";
    /// Item source adapters target.
    pub const SOURCE: &str = "horizon_selection::source";
    /// Item retention target.
    pub const RETAIN: &str = "horizon_selection::retain";
    /// Focus tracking target.
    pub const FOCUS: &str = "horizon_selection::focus";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Useful for measuring how long a mutation or fetch takes.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_selection::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Trace-level log with the Horizon Selection target.
#[macro_export]
macro_rules! selection_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "horizon_selection", $($arg)*)
    };
}

/// Debug-level log with the Horizon Selection target.
#[macro_export]
macro_rules! selection_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "horizon_selection", $($arg)*)
    };
}

/// Warn-level log with the Horizon Selection target.
#[macro_export]
macro_rules! selection_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "horizon_selection", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_are_namespaced() {
        for target in [
            targets::RANGE_SET,
            targets::SELECTION,
            targets::MANAGER,
            targets::SOURCE,
            targets::RETAIN,
            targets::FOCUS,
        ] {
            assert!(target.starts_with("horizon_selection::"), "{target}");
        }
        assert!(targets::SIGNAL.starts_with(targets::CORE));
        assert!(targets::TASK.starts_with(targets::CORE));
    }

    #[test]
    fn test_perf_span() {
        let _span = PerfSpan::new("test_operation");
    }

    #[test]
    fn test_macros_expand() {
        selection_trace!(index = 3, "trace message");
        selection_debug!("debug message");
        selection_warn!(reason = "test", "warn message");
    }
}
