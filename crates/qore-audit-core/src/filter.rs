// SPDX-License-Identifier: Apache-2.0

//! Query filter field extraction.
//!
//! Reduces a filter document to the set of top-level fields it constrains.
//! Only the `$and`, `$or` and `$nor` combinators are un-nested; every other
//! operator key is opaque and contributes nothing.

use std::collections::BTreeSet;

use serde_json::{Map, Value as JsonValue};

/// Prefix shared by every operator key
pub const OPERATOR_MARKER: char = '$';

/// Separator between path segments of a field reference
pub const PATH_SEPARATOR: char = '.';

/// Combinators whose value is a sequence of sub-filters
pub const COMBINATORS: [&str; 3] = ["$and", "$nor", "$or"];

/// Keys injected by the driver layer rather than written by the caller
pub const DEFAULT_IGNORED_KEYS: [&str; 2] = ["__t", "_bsontype"];

/// A mapping-shaped query filter.
///
/// Implemented for JSON objects and, with the `bson` feature, for BSON
/// documents. Implementors only need to expose their keys and the
/// sub-filters stored under a key when that value is a sequence.
pub trait FilterExpr {
    /// Keys at this level in declaration order
    fn filter_keys(&self) -> Vec<&str>;

    /// Sub-filters under `key` when its value is a sequence.
    ///
    /// Elements that are not mappings are skipped.
    fn sub_filters(&self, key: &str) -> Option<Vec<&Self>>;

    /// JSON rendering used for diagnostics
    fn to_json(&self) -> JsonValue;
}

impl FilterExpr for Map<String, JsonValue> {
    fn filter_keys(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }

    fn sub_filters(&self, key: &str) -> Option<Vec<&Self>> {
        let items = self.get(key)?.as_array()?;
        Some(items.iter().filter_map(JsonValue::as_object).collect())
    }

    fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.clone())
    }
}

/// Non-object values behave as an empty filter
impl FilterExpr for JsonValue {
    fn filter_keys(&self) -> Vec<&str> {
        match self {
            JsonValue::Object(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    fn sub_filters(&self, key: &str) -> Option<Vec<&Self>> {
        let items = self.get(key)?.as_array()?;
        Some(items.iter().filter(|item| item.is_object()).collect())
    }

    fn to_json(&self) -> JsonValue {
        self.clone()
    }
}

#[cfg(feature = "bson")]
impl FilterExpr for bson::Document {
    fn filter_keys(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }

    fn sub_filters(&self, key: &str) -> Option<Vec<&Self>> {
        let items = self.get_array(key).ok()?;
        Some(items.iter().filter_map(bson::Bson::as_document).collect())
    }

    fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Returns the first path segment of a field reference
pub fn top_level_name(path: &str) -> &str {
    path.split(PATH_SEPARATOR).next().unwrap_or(path)
}

/// Extracts top-level field names from query filters
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    ignored_keys: BTreeSet<String>,
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self {
            ignored_keys: DEFAULT_IGNORED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Adds keys to the ignore-list on top of the defaults
    pub fn with_ignored_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignored_keys.contains(key)
    }

    /// Returns the distinct top-level fields referenced by `filter`
    pub fn extract<F: FilterExpr + ?Sized>(&self, filter: &F) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        self.collect_fields(filter, &mut fields);
        fields
    }

    fn collect_fields<F: FilterExpr + ?Sized>(&self, filter: &F, fields: &mut BTreeSet<String>) {
        for key in filter.filter_keys() {
            if self.is_ignored(key) {
                continue;
            }

            if COMBINATORS.contains(&key) {
                if let Some(children) = filter.sub_filters(key) {
                    for child in children {
                        self.collect_fields(child, fields);
                    }
                }
                continue;
            }

            if !key.starts_with(OPERATOR_MARKER) {
                fields.insert(top_level_name(key).to_string());
            }
        }
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts top-level fields using the default ignore-list
pub fn extract_top_level_fields<F: FilterExpr + ?Sized>(filter: &F) -> BTreeSet<String> {
    FieldExtractor::new().extract(filter)
}
