//! Field rules for the donor form

use super::FieldError;
use bigdecimal::{BigDecimal, Zero};
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 1_000_000;
pub const MIN_NAME_CHARS: usize = 2;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

pub fn validate_email(field: &str, value: &str) -> Result<(), FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::new(field, "Email is required"));
    }
    if !is_valid_email(value) {
        return Err(FieldError::new(field, "Please enter a valid email address"));
    }
    Ok(())
}

/// Parses and bounds-checks a donation amount.
pub fn validate_amount(field: &str, value: &str) -> Result<BigDecimal, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::new(field, "Amount is required"));
    }

    let amount = BigDecimal::from_str(value)
        .map_err(|_| FieldError::new(field, "Please enter a valid amount"))?;

    if amount <= BigDecimal::zero() {
        return Err(FieldError::new(field, "Please enter a valid amount"));
    }
    if amount > BigDecimal::from(MAX_AMOUNT) {
        return Err(FieldError::new(
            field,
            "Amount must be between 0 and 1,000,000",
        ));
    }
    if amount < BigDecimal::from(MIN_AMOUNT) {
        return Err(FieldError::new(field, "Minimum amount is 1"));
    }

    Ok(amount)
}

pub fn validate_name(field: &str, label: &str, value: &str) -> Result<(), FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::new(field, format!("{} is required", label)));
    }
    if value.chars().count() < MIN_NAME_CHARS {
        return Err(FieldError::new(
            field,
            format!("{} must be at least {} characters", label, MIN_NAME_CHARS),
        ));
    }
    Ok(())
}

pub fn require(field: &str, label: &str, value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError::new(field, format!("{} is required", label)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(validate_email("email", "donor@church.org").is_ok());
        assert!(validate_email("email", "first.last+tag@sub.domain.ng").is_ok());

        assert_eq!(
            validate_email("email", "").unwrap_err().message,
            "Email is required"
        );
        for bad in ["plainaddress", "no@tld", "two words@x.com", "@x.com"] {
            assert_eq!(
                validate_email("email", bad).unwrap_err().message,
                "Please enter a valid email address",
                "{}",
                bad
            );
        }
    }

    #[test]
    fn amount_bounds() {
        assert_eq!(
            validate_amount("amount", "5000").unwrap(),
            BigDecimal::from(5000)
        );
        assert!(validate_amount("amount", "1").is_ok());
        assert!(validate_amount("amount", "1000000").is_ok());

        let message = |v: &str| validate_amount("amount", v).unwrap_err().message;
        assert_eq!(message(""), "Amount is required");
        assert_eq!(message("abc"), "Please enter a valid amount");
        assert_eq!(message("0"), "Please enter a valid amount");
        assert_eq!(message("-20"), "Please enter a valid amount");
        assert_eq!(message("0.5"), "Minimum amount is 1");
        assert_eq!(message("1000000.01"), "Amount must be between 0 and 1,000,000");
    }

    #[test]
    fn names_need_two_characters() {
        assert!(validate_name("firstName", "First name", "Jo").is_ok());
        assert_eq!(
            validate_name("firstName", "First name", "J")
                .unwrap_err()
                .message,
            "First name must be at least 2 characters"
        );
        assert_eq!(
            validate_name("lastName", "Last name", "  ")
                .unwrap_err()
                .message,
            "Last name is required"
        );
    }
}
