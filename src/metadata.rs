//! Per-image metadata: an ordered field map and the merge of its sources.
//!
//! Each image carries one flat mapping of field name → string value, built from
//! two independent sources:
//!
//! - **PNG text chunks** (`tEXt`/`iTXt`/`zTXt`), keyed `PNG:<keyword>`. This is
//!   where Stable Diffusion front-ends (A1111 `parameters`, ComfyUI `prompt`)
//!   store the generation prompt.
//! - **EXIF tags** from the external parser, keyed `EXIF:<tag>`.
//!
//! ## Ordering is part of the contract
//!
//! The matching engine scans fields in insertion order and takes the first
//! hit, so [`FieldMap`] preserves insertion order exactly. Replacing the value
//! of an existing key keeps the key's original position.
//!
//! ## Merge priority
//!
//! PNG fields are inserted first and the merge is first-writer-wins, so on an
//! exact key collision the PNG value is kept. With the `PNG:`/`EXIF:`
//! namespacing, collisions only happen for identical full keys.
//!
//! ## Value coercion
//!
//! The EXIF parser hands back typed values. They arrive here as a
//! [`MetadataValue`] and are coerced to strings by tag: binary and null values
//! are dropped, dates become ISO-8601, structured values become JSON, scalars
//! are stringified.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Namespace prefix for fields decoded from PNG text chunks.
pub const PNG_PREFIX: &str = "PNG:";
/// Namespace prefix for fields supplied by the EXIF parser.
pub const EXIF_PREFIX: &str = "EXIF:";

/// Insertion-ordered mapping from field name to string value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or overwrite. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Insert only if the key is not present yet. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, value.into()));
        true
    }

    /// Iterate `(field, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// A value as produced by the external metadata parser.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
    Structured(serde_json::Value),
    Null,
}

impl MetadataValue {
    /// Coerce to the string stored in a [`FieldMap`], or `None` to drop the field.
    pub fn coerce(&self) -> Option<String> {
        match self {
            MetadataValue::Text(s) => Some(s.clone()),
            MetadataValue::Integer(n) => Some(n.to_string()),
            MetadataValue::Float(f) => Some(f.to_string()),
            MetadataValue::Bool(b) => Some(b.to_string()),
            MetadataValue::Date(d) => Some(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            MetadataValue::Binary(_) | MetadataValue::Null => None,
            MetadataValue::Structured(v) => serde_json::to_string(v).ok(),
        }
    }
}

/// Merge PNG text fields and external parser fields into one mapping.
///
/// `png` keys are taken as-is (already `PNG:`-prefixed by the decoder);
/// external keys get the `EXIF:` prefix. First writer wins.
pub fn merge_sources(png: &FieldMap, external: &[(String, MetadataValue)]) -> FieldMap {
    let mut merged = FieldMap::new();
    for (key, value) in png.iter() {
        merged.insert_if_absent(key, value);
    }
    for (key, value) in external {
        if let Some(text) = value.coerce() {
            merged.insert_if_absent(format!("{EXIF_PREFIX}{key}"), text);
        }
    }
    merged
}
