// SPDX-License-Identifier: Apache-2.0

//! Collection Metadata
//!
//! Declared schema fields and index field lists, resolved once per
//! collection and cached for the lifetime of the cache.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::top_level_name;

/// Default primary-key field every collection is assumed to index
pub const DEFAULT_PRIMARY_KEY: &str = "_id";

/// Resolved schema information for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    /// Collection name
    pub name: String,
    /// Every top-level schema field name
    pub fields: BTreeSet<String>,
    /// Declared index field lists in declared order, plus the implicit
    /// primary-key index as the last entry
    pub indexes: Vec<Vec<String>>,
}

impl CollectionMetadata {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

/// Source of declared schema information for a collection.
///
/// Both resolvers must be pure and synchronous; they may run more than
/// once when the first queries against a collection race.
pub trait SchemaSource: Send + Sync {
    /// Name the metadata is cached under
    fn collection_name(&self) -> &str;

    /// Field backing the implicit single-field index
    fn primary_key(&self) -> &str {
        DEFAULT_PRIMARY_KEY
    }

    /// Top-level field names declared by the schema
    fn resolve_fields(&self) -> BTreeSet<String>;

    /// Declared index field lists, without the implicit primary-key index
    fn resolve_indexes(&self) -> Vec<Vec<String>>;
}

/// An in-memory declared schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub indexes: Vec<Vec<String>>,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: default_primary_key(),
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn field(mut self, path: impl Into<String>) -> Self {
        self.fields.push(path.into());
        self
    }

    pub fn fields<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn index<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.push(fields.into_iter().map(Into::into).collect());
        self
    }
}

impl SchemaSource for CollectionSchema {
    fn collection_name(&self) -> &str {
        &self.name
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// The primary key is always part of the schema
    fn resolve_fields(&self) -> BTreeSet<String> {
        std::iter::once(self.primary_key.as_str())
            .chain(self.fields.iter().map(|path| top_level_name(path)))
            .map(str::to_string)
            .collect()
    }

    fn resolve_indexes(&self) -> Vec<Vec<String>> {
        self.indexes.clone()
    }
}

/// Write-once-per-name cache of collection metadata
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<String, Arc<CollectionMetadata>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached metadata for the source's collection, resolving
    /// and storing it on first access.
    ///
    /// Resolution runs without holding the lock. When two callers race on
    /// the same name, the first insert wins and both get that entry.
    pub fn get_metadata(&self, source: &dyn SchemaSource) -> Arc<CollectionMetadata> {
        let name = source.collection_name();

        if let Some(entry) = self.entries.read().get(name) {
            return Arc::clone(entry);
        }

        let resolved = Arc::new(resolve(source));

        let mut entries = self.entries.write();
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(
                    "Cached metadata for collection '{}' ({} fields, {} indexes)",
                    resolved.name,
                    resolved.fields.len(),
                    resolved.indexes.len()
                );
                Arc::clone(&resolved)
            });
        Arc::clone(entry)
    }

    /// Returns the entry for `name` without resolving it
    pub fn peek(&self, name: &str) -> Option<Arc<CollectionMetadata>> {
        self.entries.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn resolve(source: &dyn SchemaSource) -> CollectionMetadata {
    let mut indexes = source.resolve_indexes();
    indexes.push(vec![source.primary_key().to_string()]);

    CollectionMetadata {
        name: source.collection_name().to_string(),
        fields: source.resolve_fields(),
        indexes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        resolutions: AtomicUsize,
    }

    impl SchemaSource for CountingSource {
        fn collection_name(&self) -> &str {
            "orders"
        }

        fn resolve_fields(&self) -> BTreeSet<String> {
            self.resolutions.fetch_add(1, Ordering::SeqCst);
            ["_id", "status"].iter().map(|f| f.to_string()).collect()
        }

        fn resolve_indexes(&self) -> Vec<Vec<String>> {
            vec![vec!["status".to_string()]]
        }
    }

    #[test]
    fn test_primary_key_index_is_appended() {
        let cache = MetadataCache::new();
        let schema = CollectionSchema::new("tasks")
            .fields(["name", "createdAt"])
            .index(["createdAt"])
            .index(["name"]);

        let metadata = cache.get_metadata(&schema);
        assert_eq!(
            metadata.indexes,
            vec![
                vec!["createdAt".to_string()],
                vec!["name".to_string()],
                vec!["_id".to_string()],
            ]
        );
        assert!(metadata.has_field("_id"));
        assert!(metadata.has_field("createdAt"));
    }

    #[test]
    fn test_nested_schema_paths_reduce_to_top_level() {
        let schema = CollectionSchema::new("customers")
            .field("profile.alias")
            .field("profile.age")
            .with_primary_key("uuid");

        let fields = schema.resolve_fields();
        assert_eq!(
            fields.into_iter().collect::<Vec<_>>(),
            vec!["profile".to_string(), "uuid".to_string()]
        );
    }

    #[test]
    fn test_entries_are_resolved_once() {
        let cache = MetadataCache::new();
        let source = CountingSource {
            resolutions: AtomicUsize::new(0),
        };

        let first = cache.get_metadata(&source);
        let second = cache.get_metadata(&source);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.resolutions.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_access_converges() {
        let cache = Arc::new(MetadataCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let schema = CollectionSchema::new("events").field("kind").index(["kind"]);
                    cache.get_metadata(&schema)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let stored = cache.peek("events").unwrap();
        assert!(results.iter().all(|m| Arc::ptr_eq(m, &stored)));
        assert_eq!(cache.len(), 1);
    }
}
