use giving_checkout::payments::types::ProviderName;
use giving_checkout::validation::phone::validate_phone;
use giving_checkout::validation::sanitizer::sanitize_input;
use giving_checkout::validation::{DonationForm, FormError};

fn donor(provider_fields: impl FnOnce(&mut DonationForm)) -> DonationForm {
    let mut form = DonationForm {
        currency: "NGN".to_string(),
        amount: "1500.50".to_string(),
        offering_type: "building-fund".to_string(),
        first_name: "Ngozi".to_string(),
        last_name: "Adeyemi".to_string(),
        email: "ngozi@example.com".to_string(),
        ..Default::default()
    };
    provider_fields(&mut form);
    form
}

#[test]
fn test_sanitizer_is_idempotent_on_donor_text() {
    let inputs = [
        "Thank you <b>Lord</b> for 2024",
        "<script>alert('x')</script>Seed offering",
        "Building fund & missions",
        "Plain comment",
    ];
    for input in inputs {
        let once = sanitize_input(input).unwrap();
        let twice = sanitize_input(&once).unwrap();
        assert_eq!(once, twice, "not idempotent for {:?}", input);
        assert!(!once.contains("<script"));
    }
}

#[test]
fn test_markup_in_names_is_removed_before_validation() {
    let form = donor(|f| f.first_name = "<i>Ngozi</i>".to_string());
    let snapshot = form.validate(ProviderName::Payaza).unwrap();
    assert_eq!(snapshot.first_name, "Ngozi");
    assert_eq!(snapshot.amount.to_string(), "1500.50");
}

#[test]
fn test_phone_rules_follow_dialing_code() {
    assert_eq!(
        validate_phone("phone", "0803 123 4567", "+234").unwrap(),
        "8031234567"
    );
    assert_eq!(
        validate_phone("phone", "024 123 4567", "+233").unwrap(),
        "241234567"
    );
    assert!(validate_phone("phone", "0803 123 4567", "+233").is_err());
    assert!(validate_phone("phone", "12ab", "+234").is_err());
}

#[test]
fn test_checkout_rejects_unsupported_currency() {
    let form = donor(|f| f.currency = "GHS".to_string());
    match form.validate(ProviderName::Payaza) {
        Err(FormError::Invalid(errors)) => {
            assert_eq!(
                errors.get("currency"),
                Some("GHS is not supported for Payaza")
            );
        }
        other => panic!("expected currency error, got {:?}", other),
    }
}

#[test]
fn test_mobile_money_requires_operator_and_number() {
    let form = donor(|f| {
        f.currency = String::new();
        f.currency_code = Some("GHS".to_string());
        f.country = "Ghana".to_string();
    });
    match form.validate(ProviderName::MomoPsb) {
        Err(FormError::Invalid(errors)) => {
            assert_eq!(
                errors.get("customerBankCode"),
                Some("Mobile money provider is required")
            );
            assert!(errors.get("customerPhoneNumber").is_some());
        }
        other => panic!("expected mobile money errors, got {:?}", other),
    }
}

#[test]
fn test_every_invalid_field_is_reported_at_once() {
    let form = DonationForm::default();
    match form.validate(ProviderName::Payaza) {
        Err(FormError::Invalid(errors)) => {
            for field in ["currency", "amount", "offeringType", "firstName", "lastName", "email"] {
                assert!(errors.get(field).is_some(), "missing error for {}", field);
            }
        }
        other => panic!("expected validation errors, got {:?}", other),
    }
}
