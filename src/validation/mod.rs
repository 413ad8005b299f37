//! Donor form sanitization and validation
//!
//! Every raw field is sanitized first, then validated. Sanitization failures
//! are reported as a generic invalid-input condition, distinct from the
//! field-scoped validation errors collected in [`ValidationErrors`].

pub mod form;
pub mod phone;
pub mod rules;
pub mod sanitizer;

pub use form::{DonationForm, FormSnapshot, MobileMoneyDetails};
pub use sanitizer::{sanitize_input, SanitizeError};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A single field-level failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Field-scoped validation failures, keyed by form field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the first failure seen for a field; later ones are dropped.
    pub fn add(&mut self, error: FieldError) {
        self.fields.entry(error.field).or_insert(error.message);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn first_message(&self) -> Option<&str> {
        self.fields.values().next().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .fields
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

impl std::error::Error for ValidationErrors {}

/// Why a donation form was rejected before any network call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error(transparent)]
    InvalidInput(#[from] SanitizeError),

    #[error("form validation failed: {0}")]
    Invalid(#[from] ValidationErrors),
}
