// SPDX-License-Identifier: Apache-2.0

//! QoreAudit core
//!
//! Query auditing primitives, independent of any driver:
//! - **Field extraction**: top-level fields a filter constrains
//! - **Metadata cache**: declared schema fields and index lists per collection
//! - **Coverage**: prefix-based index coverage of a query
//! - **Policy engine**: ignore/notify/fail decisions with throttled notifications

pub mod coverage;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod policy;
pub mod throttle;
pub mod types;

pub use coverage::{get_non_existing_fields, is_covered};
pub use error::{AuditError, AuditErrorKind, AuditResult};
pub use filter::{extract_top_level_fields, FieldExtractor, FilterExpr};
pub use metadata::{CollectionMetadata, CollectionSchema, MetadataCache, SchemaSource};
pub use policy::{
    Condition, FieldCheckHandler, IndexCheckHandler, PolicyConfig, PolicyEngine,
    DEFAULT_MIN_COVERAGE,
};
pub use throttle::{fields_digest, ThrottleSet};
pub use types::*;
