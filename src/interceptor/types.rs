// SPDX-License-Identifier: Apache-2.0

//! Interceptor Types
//!
//! Hook points and configuration for the query audit interceptor.

use serde::{Deserialize, Serialize};

/// Query operations the interceptor is wired into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryHook {
    Count,
    DeleteMany,
    DeleteOne,
    Find,
    FindOne,
    FindOneAndDelete,
    FindOneAndUpdate,
    Remove,
    Update,
    UpdateOne,
    UpdateMany,
}

/// Lifecycle a hook attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookLifecycle {
    /// Runs once per query, with the filter available
    Query,
    /// Runs per document instance; filters are not available here
    Document,
}

impl QueryHook {
    pub const ALL: [QueryHook; 11] = [
        Self::Count,
        Self::DeleteMany,
        Self::DeleteOne,
        Self::Find,
        Self::FindOne,
        Self::FindOneAndDelete,
        Self::FindOneAndUpdate,
        Self::Remove,
        Self::Update,
        Self::UpdateOne,
        Self::UpdateMany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::DeleteMany => "deleteMany",
            Self::DeleteOne => "deleteOne",
            Self::Find => "find",
            Self::FindOne => "findOne",
            Self::FindOneAndDelete => "findOneAndDelete",
            Self::FindOneAndUpdate => "findOneAndUpdate",
            Self::Remove => "remove",
            Self::Update => "update",
            Self::UpdateOne => "updateOne",
            Self::UpdateMany => "updateMany",
        }
    }

    /// Every audited hook runs at query level. Delete and remove also exist
    /// per document, but only the query-level variant sees the filter.
    pub fn lifecycle(&self) -> HookLifecycle {
        HookLifecycle::Query
    }

    /// Returns true if this operation removes documents
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::DeleteMany | Self::DeleteOne | Self::FindOneAndDelete | Self::Remove
        )
    }

    /// Returns true if this operation modifies documents
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Count | Self::Find | Self::FindOne)
    }
}

/// Configuration for the audit interceptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether auditing is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Constant warn condition
    #[serde(default = "default_true")]
    pub warn: bool,
    /// Constant throw condition
    #[serde(default)]
    pub throw: bool,
    /// Fraction of query fields an index prefix must cover
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,
    /// Install notifiers that log violations through tracing
    #[serde(default = "default_true")]
    pub log_violations: bool,
    /// Install fail-message callbacks describing the violation
    #[serde(default)]
    pub fail_with_messages: bool,
    /// Filter keys to skip on top of the driver-injected defaults
    #[serde(default)]
    pub ignored_keys: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_min_coverage() -> f64 {
    qore_audit_core::DEFAULT_MIN_COVERAGE
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warn: true,
            throw: false,
            min_coverage: default_min_coverage(),
            log_violations: true,
            fail_with_messages: false,
            ignored_keys: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_names_are_unique() {
        let mut names: Vec<&str> = QueryHook::ALL.iter().map(QueryHook::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), QueryHook::ALL.len());
    }

    #[test]
    fn test_delete_hooks_attach_at_query_level() {
        for hook in QueryHook::ALL.iter().filter(|h| h.is_delete()) {
            assert_eq!(hook.lifecycle(), HookLifecycle::Query);
        }
    }

    #[test]
    fn test_reads_are_not_mutations() {
        let reads: Vec<QueryHook> = QueryHook::ALL
            .iter()
            .copied()
            .filter(|h| !h.is_mutation())
            .collect();
        assert_eq!(reads, vec![QueryHook::Count, QueryHook::Find, QueryHook::FindOne]);
        assert!(QueryHook::ALL.iter().filter(|h| h.is_delete()).all(QueryHook::is_mutation));
    }

    #[test]
    fn test_hook_serde_matches_name() {
        let json = serde_json::to_string(&QueryHook::FindOneAndUpdate).unwrap();
        assert_eq!(json, "\"findOneAndUpdate\"");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AuditConfig = serde_json::from_str(r#"{ "throw": true }"#).unwrap();
        assert!(config.throw);
        assert!(config.enabled);
        assert!(config.warn);
        assert_eq!(config.min_coverage, 1.0);
        assert!(config.ignored_keys.is_empty());
    }
}
