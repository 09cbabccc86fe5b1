// SPDX-License-Identifier: Apache-2.0

//! Audit Types
//!
//! Values passed between the policy engine, its callbacks and the
//! interception layer.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Per-query options the auditor reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Free-text query comment, carried into violation records
    #[serde(default)]
    pub comment: Option<String>,
}

impl QueryOptions {
    pub fn with_comment(comment: impl Into<String>) -> Self {
        Self {
            comment: Some(comment.into()),
        }
    }
}

/// Description of a failed check, handed to notify and fail-message callbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Collection the query targeted
    pub collection_name: String,
    /// Offending fields: unknown fields for the field check, every
    /// referenced field for the index check
    pub violating_fields: Vec<String>,
    /// Comment attached to the query, if any
    #[serde(default)]
    pub comment: Option<String>,
    /// The filter as issued
    pub raw_filter: JsonValue,
}

/// The two independent checks run against every query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Field,
    Index,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Index => "index",
        }
    }
}

/// What a check did with a query that did not fail it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Nothing to report
    Passed,
    /// A violation was found but no action is enabled for it
    Ignored,
    /// A violation was reported through the notify callback
    Notified,
    /// A violation matched an already reported field combination
    Suppressed,
}

impl CheckOutcome {
    pub fn is_violation(&self) -> bool {
        !matches!(self, Self::Passed)
    }
}

/// Outcome of both checks for one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionReport {
    pub field: CheckOutcome,
    pub index: CheckOutcome,
}
