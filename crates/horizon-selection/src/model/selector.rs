//! Caller-supplied descriptions of what to select.
//!
//! A [`Selector`] names items by index, index range, key, key range, a mix of
//! key and index hints, or any union of those. Selectors are resolved against
//! an item source when a mutation runs; an element that cannot be resolved
//! (unknown key, index past the end, malformed input) contributes nothing.

use std::ops::RangeInclusive;

use serde_json::{Map, Value};

use super::index::IndexRange;

/// A description of items to select or deselect.
///
/// # Example
///
/// ```
/// use horizon_selection::model::Selector;
/// use serde_json::json;
///
/// assert_eq!(Selector::from(3usize), Selector::Index(3));
/// assert_eq!(Selector::from(2usize..=4), Selector::Range { first: 2, last: 4 });
/// assert_eq!(
///     Selector::from_value(&json!({"firstKey": "c", "lastKey": "d"})),
///     Selector::KeyRange { first_key: "c".into(), last_key: "d".into() },
/// );
/// assert_eq!(Selector::from_value(&json!("foo")), Selector::Invalid);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    /// A single index.
    Index(usize),
    /// An inclusive index range.
    Range { first: usize, last: usize },
    /// The item with this key.
    Key(String),
    /// The items between two keys, inclusive.
    KeyRange { first_key: String, last_key: String },
    /// A range whose endpoints carry both key and index hints.
    ///
    /// Each endpoint resolves by key when one is given and falls back to the
    /// index if the key cannot be resolved.
    Mixed {
        first_key: Option<String>,
        first_index: Option<usize>,
        last_key: Option<String>,
        last_index: Option<usize>,
    },
    /// The union of several selectors.
    Many(Vec<Selector>),
    /// Nothing; `set` with this selector clears the selection.
    #[default]
    None,
    /// Unusable input; always a no-op.
    Invalid,
}

impl Selector {
    /// Parses a loosely typed JSON selector.
    ///
    /// Accepted shapes: a non-negative integer, `null`, an array of selectors,
    /// or an object with `index`, `key`, `firstIndex`/`lastIndex` and/or
    /// `firstKey`/`lastKey` fields. Anything else, including a field of the
    /// wrong type, parses as [`Selector::Invalid`]. Inside an array `null`
    /// is an invalid element rather than a clear request.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Array(elements) => Self::Many(
                elements
                    .iter()
                    .map(|element| match element {
                        Value::Null => Self::Invalid,
                        other => Self::from_value(other),
                    })
                    .collect(),
            ),
            Value::Object(fields) => Self::from_object(fields).unwrap_or(Self::Invalid),
            other => as_index(other).map_or(Self::Invalid, Self::Index),
        }
    }

    fn from_object(fields: &Map<String, Value>) -> Option<Self> {
        let index = optional(fields, "index", as_index)?;
        let key = optional(fields, "key", as_key)?;
        let first_index = optional(fields, "firstIndex", as_index)?;
        let last_index = optional(fields, "lastIndex", as_index)?;
        let first_key = optional(fields, "firstKey", as_key)?;
        let last_key = optional(fields, "lastKey", as_key)?;

        if let Some(key) = key {
            return Some(Self::Key(key));
        }
        if let Some(index) = index {
            return Some(Self::Index(index));
        }
        let selector = match (first_key, first_index, last_key, last_index) {
            (None, Some(first), None, Some(last)) => Self::Range { first, last },
            (Some(first_key), None, Some(last_key), None) => Self::KeyRange {
                first_key,
                last_key,
            },
            (None, None, None, None) => return None,
            (first_key, first_index, last_key, last_index) => Self::Mixed {
                first_key,
                first_index,
                last_key,
                last_index,
            },
        };
        Some(selector)
    }

    /// Returns `true` for [`Selector::None`] and an empty [`Selector::Many`].
    pub fn is_none(&self) -> bool {
        match self {
            Self::None => true,
            Self::Many(elements) => elements.is_empty(),
            _ => false,
        }
    }

    /// Flattens nested unions into a list of leaf selectors.
    pub(crate) fn into_elements(self) -> Vec<Selector> {
        match self {
            Self::Many(elements) => elements
                .into_iter()
                .flat_map(Selector::into_elements)
                .collect(),
            Self::None => Vec::new(),
            other => vec![other],
        }
    }
}

/// Reads an optional field; `Some(None)` if absent, `None` if present but malformed.
fn optional<T>(
    fields: &Map<String, Value>,
    name: &str,
    parse: fn(&Value) -> Option<T>,
) -> Option<Option<T>> {
    match fields.get(name) {
        None => Some(None),
        Some(value) => parse(value).map(Some),
    }
}

fn as_index(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|n| usize::try_from(n).ok())
}

fn as_key(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<RangeInclusive<usize>> for Selector {
    fn from(range: RangeInclusive<usize>) -> Self {
        Self::Range {
            first: *range.start(),
            last: *range.end(),
        }
    }
}

impl From<IndexRange> for Selector {
    fn from(range: IndexRange) -> Self {
        Self::Range {
            first: range.first_index,
            last: range.last_index,
        }
    }
}

impl From<&str> for Selector {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for Selector {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<&Value> for Selector {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

impl From<Value> for Selector {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

impl<T: Into<Selector>> From<Vec<T>> for Selector {
    fn from(elements: Vec<T>) -> Self {
        Self::Many(elements.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Selector>, const N: usize> From<[T; N]> for Selector {
    fn from(elements: [T; N]) -> Self {
        Self::Many(elements.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Selector>> From<Option<T>> for Selector {
    fn from(selector: Option<T>) -> Self {
        selector.map_or(Self::None, Into::into)
    }
}
