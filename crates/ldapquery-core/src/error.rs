//! Error types for LDAP query operations.
//!
//! This module provides the error type hierarchy shared across the workspace,
//! including stable error codes and structured error responses for embedding
//! hosts.

use serde::Serialize;
use thiserror::Error;

/// Main error type for LDAP query operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid search scope
    #[error("Invalid search scope: {0} (expected one of: base, one, sub)")]
    InvalidScope(String),

    /// Invalid LDAP filter
    #[error("Invalid LDAP filter: {0}")]
    InvalidFilter(String),

    /// Connection to a directory server failed
    #[error("LDAP connection failed: {0}")]
    ConnectionFailed(String),

    /// Bind rejected by the directory server
    #[error("Bind to {host} failed: ({code}) {message}")]
    BindFailed {
        /// Host that rejected the bind
        host: String,
        /// Result code reported by the server
        code: u32,
        /// Diagnostic message reported by the server
        message: String,
    },

    /// Search rejected or aborted by the directory server
    #[error("LDAP search failed: {0}")]
    SearchFailed(String),

    /// Operation timed out
    #[error("Timeout waiting for LDAP operation: {0}")]
    Timeout(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Specialized result type for LDAP query operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidScope(_) => "INVALID_SCOPE",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::BindFailed { .. } => "BIND_FAILED",
            Self::SearchFailed(_) => "SEARCH_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details: None,
            },
        }
    }

    /// Returns true if this error indicates operator misconfiguration.
    ///
    /// Configuration errors propagate to the caller as hard failures;
    /// connection and search errors are absorbed into the query result.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_)
                | Self::InvalidScope(_)
                | Self::InvalidFilter(_)
                | Self::ValidationError(_)
        )
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
