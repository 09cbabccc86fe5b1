// QoreAudit - schema and index auditing for MongoDB queries
// Core library

pub mod engine;
pub mod interceptor;
pub mod observability;

pub use engine::{AuditedCollection, InterceptError, InterceptResult};
pub use interceptor::{AuditConfig, InterceptorPipeline, QueryHook};

pub use qore_audit_core as audit_core;
