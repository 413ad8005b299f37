use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// The request never produced a response.
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timed out after {seconds}s")]
    TimeoutError { seconds: u64 },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    /// The backend answered with a non-success status.
    #[error("Gateway error: status={status}, message={message}")]
    GatewayError {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::ConfigurationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::TimeoutError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::GatewayError { retryable, .. } => *retryable,
            PaymentError::InvalidResponse { .. } => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::ConfigurationError { .. } => 500,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::TimeoutError { .. } => 504,
            PaymentError::RateLimitError { .. } => 429,
            PaymentError::GatewayError { status, .. } if *status == 404 => 404,
            PaymentError::GatewayError { .. } => 502,
            PaymentError::InvalidResponse { .. } => 502,
        }
    }

    /// Message safe to show a donor. Backend-supplied messages pass through
    /// because the backend writes them for end users.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::ConfigurationError { .. } => {
                "Payment configuration error. Please contact support.".to_string()
            }
            PaymentError::NetworkError { .. } => {
                "Payment service is temporarily unavailable".to_string()
            }
            PaymentError::TimeoutError { .. } => {
                "Payment service took too long to respond".to_string()
            }
            PaymentError::RateLimitError { .. } => {
                "Too many requests to the payment service. Please retry shortly".to_string()
            }
            PaymentError::GatewayError { message, .. } => message.clone(),
            PaymentError::InvalidResponse { .. } => {
                "Payment service returned an unexpected response".to_string()
            }
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError, ValidationError};

        let kind = match &err {
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.clone().unwrap_or_else(|| "request".to_string()),
                    reason: message.clone(),
                })
            }
            PaymentError::TimeoutError { seconds } => {
                AppErrorKind::External(ExternalError::Timeout {
                    service: "collections".to_string(),
                    timeout_secs: *seconds,
                })
            }
            PaymentError::RateLimitError {
                retry_after_seconds,
                ..
            } => AppErrorKind::External(ExternalError::RateLimit {
                service: "collections".to_string(),
                retry_after: *retry_after_seconds,
            }),
            _ => AppErrorKind::External(ExternalError::Gateway {
                status: err.http_status_code(),
                message: err.user_message(),
                is_retryable: err.is_retryable(),
            }),
        };

        AppError::new(kind)
    }
}
