// SPDX-License-Identifier: Apache-2.0

//! Audit failure types
//!
//! Both variants are terminal for the query attempt. The message is produced
//! by the fail-message callback configured on the check and is surfaced to
//! the caller verbatim.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which check produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditErrorKind {
    InvalidField,
    LowIndexCoverage,
}

/// Typed failure signaled when throw-mode aborts a query
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AuditError {
    #[error("{message}")]
    InvalidField { message: String },

    #[error("{message}")]
    LowIndexCoverage { message: String },
}

impl AuditError {
    pub fn invalid_field(msg: impl Into<String>) -> Self {
        Self::InvalidField { message: msg.into() }
    }

    pub fn low_index_coverage(msg: impl Into<String>) -> Self {
        Self::LowIndexCoverage { message: msg.into() }
    }

    pub fn kind(&self) -> AuditErrorKind {
        match self {
            Self::InvalidField { .. } => AuditErrorKind::InvalidField,
            Self::LowIndexCoverage { .. } => AuditErrorKind::LowIndexCoverage,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidField { message } | Self::LowIndexCoverage { message } => message,
        }
    }
}

/// Result type alias for audit checks
pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_verbatim() {
        let err = AuditError::invalid_field("unknown field: createdAt");
        assert_eq!(err.to_string(), "unknown field: createdAt");
        assert_eq!(err.message(), "unknown field: createdAt");
        assert_eq!(err.kind(), AuditErrorKind::InvalidField);
    }

    #[test]
    fn test_kinds_are_distinguishable() {
        let err = AuditError::low_index_coverage("coverage 0.5 < 1");
        assert_eq!(err.kind(), AuditErrorKind::LowIndexCoverage);
        assert_ne!(err, AuditError::invalid_field("coverage 0.5 < 1"));
    }
}
