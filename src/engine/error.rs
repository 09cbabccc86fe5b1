// SPDX-License-Identifier: Apache-2.0

//! Interceptor error types
//!
//! Audit failures are passed through unchanged so callers can match on the
//! failure kind and read the configured message verbatim.

use qore_audit_core::AuditError;
use thiserror::Error;

/// Unified error type for audited query execution
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("Query execution error: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl InterceptError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config { message: msg.into() }
    }

    /// The audit failure behind this error, if any
    pub fn as_audit(&self) -> Option<&AuditError> {
        match self {
            Self::Audit(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for interceptor operations
pub type InterceptResult<T> = Result<T, InterceptError>;
