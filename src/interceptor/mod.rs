// SPDX-License-Identifier: Apache-2.0

//! Query Audit Interceptor
//!
//! Runs before every query-style operation:
//! - **Field check**: every referenced field must be declared in the schema
//! - **Index check**: the referenced fields must be covered by an index prefix
//! - **Stats**: counters for inspected queries and violations
//!
//! Callbacks decide whether a violation is logged, fails the query, or both.

pub mod pipeline;
pub mod stats;
pub mod types;

pub use pipeline::{InterceptorPipeline, CONFIG_FILE_NAME};
pub use stats::{AuditStats, AuditStatsSnapshot};
pub use types::*;
