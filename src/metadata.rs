//! Per-execution metadata threaded through every pipeline phase.
//!
//! The same [`Metadata`] instance is handed by mutable reference to every
//! validator, processor and destination of one execution, so a step can record
//! state (e.g. the original filename) for a later step to read.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Keys read or written by the built-in validators and processors.
pub mod keys {
    /// Caller-supplied name to use instead of the handle's own name.
    pub const FILENAME: &str = "filename";
    /// Name of the handle before the first rename.
    pub const ORIGINAL_FILENAME: &str = "original_filename";
    /// Human-readable outcome for the end user.
    pub const MESSAGE: &str = "message";
    /// Set to `false` to disable collision-avoiding renames.
    pub const AVOID_NAME_COLLISION: &str = "avoid_name_collision";
    /// Where a directory destination wrote the upload.
    pub const SAVED_TO: &str = "saved_to";
}

/// A schemaless string-keyed mapping of JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Renders as compact JSON, e.g. `{"width":1080}`.
impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("{..}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters() {
        let mut meta = Metadata::new();
        meta.insert("filename", "report.pdf");
        meta.insert("width", 1080);
        meta.insert("avoid_name_collision", false);

        assert_eq!(meta.get_str("filename"), Some("report.pdf"));
        assert_eq!(meta.get_u64("width"), Some(1080));
        assert_eq!(meta.get_bool("avoid_name_collision"), Some(false));
        assert_eq!(meta.get_str("width"), None);
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn display_is_json() {
        let meta: Metadata = [("a", 1)].into_iter().collect();
        assert_eq!(meta.to_string(), r#"{"a":1}"#);
        assert_eq!(Metadata::new().to_string(), "{}");
    }
}
