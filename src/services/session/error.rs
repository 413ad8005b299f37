use crate::payments::types::ProviderName;
use crate::services::session::resolver::MismatchReason;
use crate::services::session::types::AttemptStatus;
use crate::validation::{FormError, ValidationErrors};
use serde::Serialize;
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

/// Broad failure classes, each with its own recovery
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad input; nothing was sent anywhere
    Validation,
    /// Missing provider key or provider selection
    Configuration,
    /// Collection could not be created; safe to retry from scratch
    CreationTransport,
    /// Completion request never produced an answer
    CompletionTransport,
    CompletionTimeout,
    /// Backend answered but statuses disagree
    Semantic,
    Internal,
}

#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionError {
    #[error("no payment provider selected")]
    MissingProvider,

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("validation failed: {errors}")]
    Validation { errors: ValidationErrors },

    #[error("input could not be sanitized: {reason}")]
    InvalidInput { reason: String },

    #[error("collection creation failed via {provider}: {message}")]
    CollectionCreation {
        provider: ProviderName,
        message: String,
    },

    #[error("checkout window could not be opened: {message}")]
    CheckoutLaunch { message: String },

    #[error("checkout reported a failed payment")]
    CheckoutFailed,

    #[error("completion request failed: {message}")]
    CompletionTransport { message: String },

    #[error("completion did not answer within {seconds}s")]
    CompletionTimeout { seconds: u64 },

    #[error("completion mismatch: {reason}")]
    CompletionMismatch { reason: MismatchReason },

    #[error("completion response could not be read")]
    UnreadableCompletion,

    #[error("attempt store error: {message}")]
    Store { message: String },

    #[error("cannot {action} while attempt is {current}")]
    InvalidState {
        current: AttemptStatus,
        action: String,
    },
}

impl SessionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::Validation { .. } | SessionError::InvalidInput { .. } => {
                ErrorCategory::Validation
            }
            SessionError::MissingProvider | SessionError::Configuration { .. } => {
                ErrorCategory::Configuration
            }
            SessionError::CollectionCreation { .. } | SessionError::CheckoutLaunch { .. } => {
                ErrorCategory::CreationTransport
            }
            SessionError::CompletionTransport { .. } | SessionError::UnreadableCompletion => {
                ErrorCategory::CompletionTransport
            }
            SessionError::CompletionTimeout { .. } => ErrorCategory::CompletionTimeout,
            SessionError::CompletionMismatch { .. } | SessionError::CheckoutFailed => {
                ErrorCategory::Semantic
            }
            SessionError::Store { .. } | SessionError::InvalidState { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    /// Whether the donor should be told to contact support if they were
    /// charged
    pub fn may_have_charged(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::CompletionTransport
                | ErrorCategory::CompletionTimeout
                | ErrorCategory::Semantic
        ) && !matches!(self, SessionError::CheckoutFailed)
    }

    pub fn user_message(&self) -> String {
        match self {
            SessionError::MissingProvider => {
                "Please select a payment provider (Payaza or MOMO PSB)".to_string()
            }
            SessionError::Configuration { .. } => {
                "Payment configuration error. Please contact support.".to_string()
            }
            SessionError::Validation { errors } => errors
                .first_message()
                .unwrap_or("Please fill in all required fields")
                .to_string(),
            SessionError::InvalidInput { .. } => {
                "Invalid input detected. Please check your data.".to_string()
            }
            SessionError::CollectionCreation { provider, message } => match provider {
                ProviderName::Payaza => {
                    format!("Failed to initialize payment: {}. Please try again.", message)
                }
                ProviderName::MomoPsb => format!("Momo payment failed: {}", message),
            },
            SessionError::CheckoutLaunch { .. } => {
                "Unable to open the payment window. Please try again.".to_string()
            }
            SessionError::CheckoutFailed => "Payment failed. Please try again.".to_string(),
            SessionError::CompletionTransport { .. } => {
                "We could not confirm your payment. Please contact support if amount was deducted."
                    .to_string()
            }
            SessionError::CompletionTimeout { .. } => {
                "Collection completion is taking longer than expected. Please contact support if amount was deducted."
                    .to_string()
            }
            SessionError::CompletionMismatch { reason } => format!(
                "Payment processing incomplete: {}. Please contact support if amount was deducted.",
                reason
            ),
            SessionError::UnreadableCompletion => {
                "We received an unexpected response while confirming your payment. Please contact support if amount was deducted."
                    .to_string()
            }
            SessionError::Store { .. } => {
                "Unable to track this payment right now. Please try again.".to_string()
            }
            SessionError::InvalidState { current, action } => {
                format!("Cannot {} while the payment is {}", action, current)
            }
        }
    }
}

impl From<FormError> for SessionError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::InvalidInput(e) => SessionError::InvalidInput {
                reason: e.to_string(),
            },
            FormError::Invalid(errors) => SessionError::Validation { errors },
        }
    }
}
