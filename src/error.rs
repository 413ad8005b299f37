//! Application error handling
//!
//! A unified error type with HTTP status mapping, user-facing messages and
//! structured error codes for API clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Domain errors (4xx)
    SessionNotFound,
    CheckoutNotFound,
    CollectionNotFound,

    // Infrastructure errors (5xx)
    CacheError,
    ConfigurationError,

    // External errors (502, 503, 504)
    PaymentGatewayError,
    RateLimitError,
    ExternalServiceTimeout,

    // Input errors (400)
    ValidationError,
}

/// Domain-specific lookup errors
#[derive(Debug, Clone)]
pub enum DomainError {
    SessionNotFound { session_id: String },
    /// No checkout window is open for the reference
    CheckoutNotFound { reference: String },
    CollectionNotFound { collection_no: String },
}

/// Infrastructure-level errors (cache, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Attempt store unavailable
    Cache { message: String },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// Collections backend errors
#[derive(Debug, Clone)]
pub enum ExternalError {
    Gateway {
        status: u16,
        message: String,
        is_retryable: bool,
    },
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    InvalidField { field: String, reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::SessionNotFound {
            session_id: session_id.into(),
        }))
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }))
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(_) => 404,
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { status, .. } => *status,
                ExternalError::RateLimit { .. } => 429,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
                DomainError::CheckoutNotFound { .. } => ErrorCode::CheckoutNotFound,
                DomainError::CollectionNotFound { .. } => ErrorCode::CollectionNotFound,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Cache { .. } => ErrorCode::CacheError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { .. } => ErrorCode::PaymentGatewayError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::SessionNotFound { session_id } => {
                    format!("Payment session '{}' not found", session_id)
                }
                DomainError::CheckoutNotFound { reference } => {
                    format!("No open checkout for reference '{}'", reference)
                }
                DomainError::CollectionNotFound { collection_no } => {
                    format!("Collection '{}' not found", collection_no)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { message, .. } => message.clone(),
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => match retry_after {
                    Some(secs) => format!(
                        "Rate limit exceeded for {}. Please try again in {} seconds",
                        service, secs
                    ),
                    None => format!("Rate limit exceeded for {}. Please try again later", service),
                },
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => format!(
                    "{} request timed out after {} seconds. Please try again",
                    service, timeout_secs
                ),
            },
            AppErrorKind::Validation(ValidationError::InvalidField { reason, .. }) => {
                reason.clone()
            }
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Cache { .. } => true,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { is_retryable, .. } => *is_retryable,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }

    /// Field-level details for validation failures
    pub fn details(&self) -> Option<serde_json::Value> {
        match &self.kind {
            AppErrorKind::Validation(ValidationError::InvalidField { field, reason }) => {
                Some(serde_json::json!({ "field": field, "error": reason }))
            }
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: err.to_string(),
            },
        ))
    }
}

impl From<crate::services::session::StoreError> for AppError {
    fn from(err: crate::services::session::StoreError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Cache {
            message: err.to_string(),
        }))
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
