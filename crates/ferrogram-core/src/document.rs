//! Path-based access into decoded JSON documents.
//!
//! API responses and pushed updates are decoded into a [`serde_json::Value`]
//! tree first. [`Document`] walks that tree with dotted paths such as
//! `result.0.message.text`: object members are addressed by key, array
//! elements by decimal index.
//!
//! ```rust
//! use ferrogram_core::Document;
//! use serde_json::json;
//!
//! let value = json!({"ok": true, "result": [{"update_id": 7}]});
//! let doc = Document::new(&value);
//! assert_eq!(doc.u64("result.0.update_id"), Some(7));
//! assert!(doc.get("result.1").is_none());
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::{DecodeError, DecodeResult};

/// Read-only view over a decoded document.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    root: &'a Value,
}

impl<'a> Document<'a> {
    /// Wraps a decoded value.
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Returns the wrapped root value.
    pub fn root(&self) -> &'a Value {
        self.root
    }

    /// Resolves a dotted path. Empty path segments are ignored, so `""`
    /// resolves to the root.
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        let mut current = self.root;
        for (depth, segment) in path.split('.').filter(|s| !s.is_empty()).enumerate() {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => {
                    let Ok(index) = segment.parse::<usize>() else {
                        trace!(path, depth, "non-numeric index into array");
                        return None;
                    };
                    items.get(index)?
                }
                _ => {
                    trace!(path, depth, "path continues past a scalar value");
                    return None;
                }
            };
        }
        Some(current)
    }

    /// Returns true if `path` resolves to a present, non-null value.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some_and(|v| !v.is_null())
    }

    /// Returns a sub-document rooted at `path`.
    pub fn at(&self, path: &str) -> Option<Document<'a>> {
        self.get(path).map(Document::new)
    }

    pub fn str(&self, path: &str) -> Option<&'a str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    pub fn i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    pub fn u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(Value::as_u64)
    }

    /// Decodes the value at `path` into a typed record.
    ///
    /// Returns `Ok(None)` when the path is absent or null, so optional
    /// records can be decoded without special casing.
    pub fn decode<T: DeserializeOwned>(&self, path: &str) -> DecodeResult<Option<T>> {
        match self.get(path) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| DecodeError::InvalidField {
                    field: path.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Decodes every element of the array (or every member value of the
    /// object) at `path`.
    ///
    /// Elements that fail to decode are skipped; a missing path yields an
    /// empty list.
    pub fn decode_list<T: DeserializeOwned>(&self, path: &str) -> Vec<T> {
        let items: Box<dyn Iterator<Item = &'a Value> + 'a> = match self.get(path) {
            Some(Value::Array(items)) => Box::new(items.iter()),
            Some(Value::Object(map)) => Box::new(map.values()),
            _ => return Vec::new(),
        };
        items
            .filter_map(|item| match T::deserialize(item) {
                Ok(v) => Some(v),
                Err(e) => {
                    trace!(path, error = %e, "skipping undecodable list element");
                    None
                }
            })
            .collect()
    }
}

impl<'a> From<&'a Value> for Document<'a> {
    fn from(value: &'a Value) -> Self {
        Self::new(value)
    }
}
