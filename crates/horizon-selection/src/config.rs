//! Selection configuration.
//!
//! [`SelectionConfig`] controls the selection mode and how aggressively the
//! engine talks to its item source. It can be built in code or read from TOML:
//!
//! ```
//! use horizon_selection::{SelectionConfig, SelectionMode};
//!
//! let config = SelectionConfig::from_toml_str(
//!     r#"
//!     mode = "single"
//!     fetch_page_size = 16
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.mode, SelectionMode::Single);
//! assert!(config.pin_endpoints);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SelectionError, SelectionResult};

/// Selection behavior mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// No item can be selected; only `clear` is accepted.
    None,
    /// At most one item is selected at a time.
    Single,
    /// Any number of items can be selected (default).
    #[default]
    Multi,
}

impl SelectionMode {
    /// Returns `true` unless the mode is [`SelectionMode::None`].
    pub fn allows_selection(self) -> bool {
        self != Self::None
    }

    /// Returns `true` for [`SelectionMode::Multi`].
    pub fn is_multi(self) -> bool {
        self == Self::Multi
    }
}

/// Tunables for a selection and its manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Selection behavior mode.
    pub mode: SelectionMode,
    /// Maximum number of items requested per fetch when expanding a selection
    /// into item records.
    pub fetch_page_size: usize,
    /// Whether range endpoints pin their items for drift detection.
    pub pin_endpoints: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::Multi,
            fetch_page_size: 64,
            pin_endpoints: true,
        }
    }
}

impl SelectionConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from TOML; missing fields take their defaults.
    pub fn from_toml_str(content: &str) -> SelectionResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SelectionError::Config(e.to_string()))?;
        config.validated()
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml_string(&self) -> SelectionResult<String> {
        toml::to_string_pretty(self).map_err(|e| SelectionError::Config(e.to_string()))
    }

    /// Sets the selection mode.
    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the fetch page size.
    pub fn with_fetch_page_size(mut self, size: usize) -> Self {
        self.fetch_page_size = size;
        self
    }

    /// Enables or disables endpoint pinning.
    pub fn with_pin_endpoints(mut self, pin: bool) -> Self {
        self.pin_endpoints = pin;
        self
    }

    fn validated(self) -> SelectionResult<Self> {
        if self.fetch_page_size == 0 {
            return Err(SelectionError::Config(
                "fetch_page_size must be at least 1".into(),
            ));
        }
        Ok(self)
    }

    pub(crate) fn page_size(&self) -> usize {
        self.fetch_page_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SelectionConfig::default();
        assert_eq!(config.mode, SelectionMode::Multi);
        assert!(config.pin_endpoints);
        assert!(config.mode.allows_selection());
    }

    #[test]
    fn test_builder() {
        let config = SelectionConfig::new()
            .with_mode(SelectionMode::None)
            .with_fetch_page_size(8)
            .with_pin_endpoints(false);
        assert!(!config.mode.allows_selection());
        assert_eq!(config.fetch_page_size, 8);
        assert!(!config.pin_endpoints);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SelectionConfig::new().with_mode(SelectionMode::Single);
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("mode = \"single\""));
        assert_eq!(SelectionConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_toml_rejects_bad_input() {
        assert!(matches!(
            SelectionConfig::from_toml_str("mode = \"sometimes\""),
            Err(SelectionError::Config(_))
        ));
        assert!(matches!(
            SelectionConfig::from_toml_str("fetch_page_size = 0"),
            Err(SelectionError::Config(_))
        ));
    }
}
