//! Core error types for ProDetect services

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for ProDetect services.
///
/// Every variant carries a stable machine-readable `code` in addition to the
/// human message, so transport layers can map errors without string matching.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ProDetectError {
    /// Precondition on the request payload was violated
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        code: String,
    },

    /// Entity id did not resolve
    #[error("Resource not found: {resource_type} with ID {resource_id}")]
    NotFound {
        resource_type: String,
        resource_id: String,
        code: String,
    },

    /// Operation is disallowed in the entity's current state
    #[error("Invalid state for {resource_type}: {message}")]
    State {
        resource_type: String,
        message: String,
        code: String,
    },

    /// Stale write or uniqueness collision; retryable by the caller
    #[error("Conflict: {message}")]
    Conflict { message: String, code: String },

    /// Deadline exceeded; the in-flight call was cancelled without partial writes
    #[error("Operation timed out: {operation}")]
    Timeout {
        operation: String,
        timeout_seconds: u32,
        code: String,
    },

    /// Store failure
    #[error("Database error: {message}")]
    Database {
        message: String,
        operation: String,
        code: String,
    },

    /// External collaborator failure, with the failing subsystem identified
    #[error("External service error: {service} - {message}")]
    ExternalService {
        service: String,
        message: String,
        code: String,
    },

    /// Invariant violated; the operation aborts and the event is audited
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        source_detail: Option<String>,
        code: String,
    },
}

impl ProDetectError {
    /// Get the stable error code
    pub fn code(&self) -> &str {
        match self {
            Self::Validation { code, .. } => code,
            Self::NotFound { code, .. } => code,
            Self::State { code, .. } => code,
            Self::Conflict { code, .. } => code,
            Self::Timeout { code, .. } => code,
            Self::Database { code, .. } => code,
            Self::ExternalService { code, .. } => code,
            Self::Internal { code, .. } => code,
        }
    }

    /// Check if the caller may retry the operation as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Timeout { .. })
    }

    /// Check if the error is attributable to the caller's request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::NotFound { .. } | Self::State { .. }
        )
    }

    /// Shorthand for a not-found error with the conventional code
    pub fn not_found(resource_type: &str, resource_id: impl ToString) -> Self {
        Self::NotFound {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            code: format!("{}_NOT_FOUND", resource_type.to_uppercase()),
        }
    }

    /// Shorthand for a validation error
    pub fn validation(message: impl Into<String>, code: &str) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            code: code.to_string(),
        }
    }

    /// Shorthand for a state error
    pub fn state(resource_type: &str, message: impl Into<String>, code: &str) -> Self {
        Self::State {
            resource_type: resource_type.to_string(),
            message: message.into(),
            code: code.to_string(),
        }
    }

    /// Shorthand for the optimistic-concurrency conflict
    pub fn stale_write(resource_type: &str, resource_id: impl ToString) -> Self {
        Self::Conflict {
            message: format!(
                "{} {} was modified concurrently",
                resource_type,
                resource_id.to_string()
            ),
            code: "STALE_WRITE".to_string(),
        }
    }
}

impl From<sea_orm::DbErr> for ProDetectError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database {
            message: err.to_string(),
            operation: "query".to_string(),
            code: "DATABASE_ERROR".to_string(),
        }
    }
}

impl From<serde_json::Error> for ProDetectError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("Serialization failed: {}", err),
            source_detail: None,
            code: "SERIALIZATION_ERROR".to_string(),
        }
    }
}

/// Result type alias for ProDetect operations
pub type Result<T> = std::result::Result<T, ProDetectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ProDetectError::not_found("customer", "abc");
        assert_eq!(err.code(), "CUSTOMER_NOT_FOUND");
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_stale_write_is_retryable() {
        let err = ProDetectError::stale_write("case", "123");
        assert_eq!(err.code(), "STALE_WRITE");
        assert!(err.is_retryable());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_state_error_classification() {
        let err = ProDetectError::state("rule", "rule is not active", "RULE_NOT_ACTIVE");
        assert!(err.is_client_error());
        assert_eq!(err.code(), "RULE_NOT_ACTIVE");
    }
}
