// Interception Engine Module
// Driver-facing glue between query execution and the audit pipeline

pub mod error;
pub mod mongo;

pub use error::{InterceptError, InterceptResult};
pub use mongo::{index_fields, schema_with_index_models, AuditedCollection};
