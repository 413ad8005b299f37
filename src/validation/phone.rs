//! Per-country phone number rules, keyed by dialing code

use super::FieldError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

pub const DEFAULT_DIALING_CODE: &str = "+234";

const FALLBACK_MIN_DIGITS: usize = 7;
const FALLBACK_MAX_DIGITS: usize = 15;

#[derive(Debug, Clone, Copy)]
pub struct PhoneRule {
    pub dialing_code: &'static str,
    pub min_digits: usize,
    pub max_digits: usize,
    pub pattern: Option<&'static str>,
    pub description: &'static str,
}

pub const PHONE_RULES: &[PhoneRule] = &[
    PhoneRule {
        dialing_code: "+234",
        min_digits: 10,
        max_digits: 10,
        pattern: Some(r"^[789]\d{9}$"),
        description: "Nigerian number (10 digits, starts with 7, 8, or 9)",
    },
    PhoneRule {
        dialing_code: "+233",
        min_digits: 9,
        max_digits: 9,
        pattern: Some(r"^[2-9]\d{8}$"),
        description: "Ghanaian number (9 digits)",
    },
    PhoneRule {
        dialing_code: "+254",
        min_digits: 9,
        max_digits: 9,
        pattern: Some(r"^[17]\d{8}$"),
        description: "Kenyan number (9 digits, starts with 1 or 7)",
    },
    PhoneRule {
        dialing_code: "+229",
        min_digits: 8,
        max_digits: 8,
        pattern: None,
        description: "Benin number (8 digits)",
    },
    PhoneRule {
        dialing_code: "+237",
        min_digits: 8,
        max_digits: 9,
        pattern: Some(r"^[26]\d{7,8}$"),
        description: "Cameroon number (8-9 digits, starts with 2 or 6)",
    },
    PhoneRule {
        dialing_code: "+225",
        min_digits: 8,
        max_digits: 8,
        pattern: None,
        description: "Cote d'Ivoire number (8 digits)",
    },
    PhoneRule {
        dialing_code: "+256",
        min_digits: 9,
        max_digits: 9,
        pattern: Some(r"^[37]\d{8}$"),
        description: "Uganda number (9 digits, starts with 3 or 7)",
    },
    PhoneRule {
        dialing_code: "+255",
        min_digits: 9,
        max_digits: 9,
        pattern: Some(r"^[67]\d{8}$"),
        description: "Tanzania number (9 digits, starts with 6 or 7)",
    },
    PhoneRule {
        dialing_code: "+232",
        min_digits: 8,
        max_digits: 8,
        pattern: Some(r"^[2-9]\d{7}$"),
        description: "Sierra Leone number (8 digits)",
    },
    PhoneRule {
        dialing_code: "+1",
        min_digits: 10,
        max_digits: 10,
        pattern: Some(r"^[2-9]\d{9}$"),
        description: "US/Canada number (10 digits)",
    },
    PhoneRule {
        dialing_code: "+44",
        min_digits: 10,
        max_digits: 10,
        pattern: Some(r"^[17]\d{9}$"),
        description: "UK number (10 digits)",
    },
    PhoneRule {
        dialing_code: "+27",
        min_digits: 9,
        max_digits: 9,
        pattern: Some(r"^[1-9]\d{8}$"),
        description: "South Africa number (9 digits)",
    },
];

struct CompiledRule {
    rule: &'static PhoneRule,
    pattern: Option<Regex>,
}

static COMPILED_RULES: Lazy<HashMap<&'static str, CompiledRule>> = Lazy::new(|| {
    PHONE_RULES
        .iter()
        .map(|rule| {
            let pattern = rule
                .pattern
                .map(|p| Regex::new(p).expect("phone pattern compiles"));
            (rule.dialing_code, CompiledRule { rule, pattern })
        })
        .collect()
});

pub fn rule_for(dialing_code: &str) -> Option<&'static PhoneRule> {
    COMPILED_RULES.get(dialing_code.trim()).map(|c| c.rule)
}

/// Drops spaces, dashes and parentheses.
pub fn strip_formatting(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect()
}

/// Validates `number` against the rule for `dialing_code` and returns the
/// local digits with any leading zeros or plus signs removed.
pub fn validate_phone(
    field: &str,
    number: &str,
    dialing_code: &str,
) -> Result<String, FieldError> {
    let cleaned = strip_formatting(number);
    if cleaned.is_empty() {
        return Err(FieldError::new(field, "Phone number is required"));
    }

    let digits = cleaned.trim_start_matches(['0', '+']);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldError::new(
            field,
            "Phone number must contain only digits",
        ));
    }

    let Some(compiled) = COMPILED_RULES.get(dialing_code.trim()) else {
        if digits.len() < FALLBACK_MIN_DIGITS || digits.len() > FALLBACK_MAX_DIGITS {
            return Err(FieldError::new(
                field,
                format!(
                    "Phone number must be between {} and {} digits",
                    FALLBACK_MIN_DIGITS, FALLBACK_MAX_DIGITS
                ),
            ));
        }
        return Ok(digits.to_string());
    };

    let rule = compiled.rule;
    if digits.len() < rule.min_digits {
        return Err(FieldError::new(
            field,
            format!(
                "Phone number too short. Expected {} digits for {}",
                rule.min_digits, rule.description
            ),
        ));
    }
    if digits.len() > rule.max_digits {
        return Err(FieldError::new(
            field,
            format!(
                "Phone number too long. Expected {} digits for {}",
                rule.max_digits, rule.description
            ),
        ));
    }
    if let Some(pattern) = &compiled.pattern {
        if !pattern.is_match(digits) {
            return Err(FieldError::new(
                field,
                format!("Invalid phone number format for {}", rule.description),
            ));
        }
    }

    Ok(digits.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(number: &str, code: &str) -> String {
        validate_phone("phone", number, code).unwrap_err().message
    }

    #[test]
    fn nigerian_numbers() {
        assert_eq!(
            validate_phone("phone", "8012345678", "+234").unwrap(),
            "8012345678"
        );
        assert_eq!(
            validate_phone("phone", "0801 234-5678", "+234").unwrap(),
            "8012345678"
        );
        assert_eq!(
            message("6012345678", "+234"),
            "Invalid phone number format for Nigerian number (10 digits, starts with 7, 8, or 9)"
        );
    }

    #[test]
    fn nigerian_length_under_ghana_rule_is_too_long() {
        assert_eq!(
            message("8012345678", "+233"),
            "Phone number too long. Expected 9 digits for Ghanaian number (9 digits)"
        );
        assert_eq!(
            message("2412345", "+233"),
            "Phone number too short. Expected 9 digits for Ghanaian number (9 digits)"
        );
        assert!(validate_phone("phone", "0241234567", "+233").is_ok());
    }

    #[test]
    fn non_digits_are_rejected() {
        assert_eq!(
            message("80abc45678", "+234"),
            "Phone number must contain only digits"
        );
        assert_eq!(message("000", "+234"), "Phone number must contain only digits");
    }

    #[test]
    fn rules_without_pattern_check_length_only() {
        assert!(validate_phone("phone", "12345678", "+229").is_ok());
        assert!(validate_phone("phone", "(01) 23 45 67 89", "+225").is_err());
    }

    #[test]
    fn unknown_codes_fall_back_to_generic_length() {
        assert!(validate_phone("phone", "1234567", "+49").is_ok());
        assert_eq!(
            message("123456", "+49"),
            "Phone number must be between 7 and 15 digits"
        );
    }

    #[test]
    fn every_rule_pattern_compiles() {
        for rule in PHONE_RULES {
            assert!(rule_for(rule.dialing_code).is_some());
        }
    }
}
