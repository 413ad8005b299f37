use super::phone::{validate_phone, DEFAULT_DIALING_CODE};
use super::rules::{require, validate_amount, validate_email, validate_name};
use super::sanitizer::sanitize_input;
use super::{FieldError, FormError, SanitizeError, ValidationErrors};
use crate::payments::momo;
use crate::payments::types::{ProviderFlow, ProviderName};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Currencies the hosted checkout settles in
pub const CHECKOUT_CURRENCIES: &[&str] = &["NGN", "USD"];

/// Raw donor input exactly as submitted
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DonationForm {
    pub currency: String,
    pub amount: String,
    pub offering_type: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub comment: String,
    pub country: String,
    pub phone_country_code: Option<String>,
    pub currency_code: Option<String>,
    pub customer_bank_code: Option<String>,
    pub customer_phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MobileMoneyDetails {
    pub bank_code: String,
    /// Local digits, leading zeros removed
    pub phone_number: String,
    pub dialing_code: String,
    pub country_code: Option<String>,
}

impl MobileMoneyDetails {
    pub fn msisdn(&self) -> String {
        momo::msisdn(&self.dialing_code, &self.phone_number)
    }
}

/// Sanitized, validated form values frozen at submission time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub provider: ProviderName,
    pub currency: String,
    pub amount: BigDecimal,
    pub offering_type: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub phone_country_code: String,
    pub comment: String,
    pub mobile_money: Option<MobileMoneyDetails>,
}

impl FormSnapshot {
    pub fn donor_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Phone number in international form, or empty when none was given
    pub fn full_phone_number(&self) -> String {
        match (&self.mobile_money, &self.phone) {
            (Some(details), _) => details.msisdn(),
            (None, Some(phone)) => format!("{}{}", self.phone_country_code, phone),
            (None, None) => String::new(),
        }
    }
}

fn sanitize_optional(value: &Option<String>) -> Result<Option<String>, SanitizeError> {
    value.as_deref().map(sanitize_input).transpose()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn record<T>(errors: &mut ValidationErrors, result: Result<T, FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            errors.add(error);
            None
        }
    }
}

impl DonationForm {
    /// Sanitizes every field. Any field that cannot be sanitized fails the
    /// whole form.
    pub fn sanitized(&self) -> Result<Self, SanitizeError> {
        Ok(Self {
            currency: sanitize_input(&self.currency)?,
            amount: sanitize_input(&self.amount)?,
            offering_type: sanitize_input(&self.offering_type)?,
            first_name: sanitize_input(&self.first_name)?,
            last_name: sanitize_input(&self.last_name)?,
            email: sanitize_input(&self.email)?,
            phone: sanitize_input(&self.phone)?,
            comment: sanitize_input(&self.comment)?,
            country: sanitize_input(&self.country)?,
            phone_country_code: sanitize_optional(&self.phone_country_code)?,
            currency_code: sanitize_optional(&self.currency_code)?,
            customer_bank_code: sanitize_optional(&self.customer_bank_code)?,
            customer_phone_number: sanitize_optional(&self.customer_phone_number)?,
        })
    }

    /// Sanitizes then validates the form for `provider`.
    pub fn validate(&self, provider: ProviderName) -> Result<FormSnapshot, FormError> {
        let form = self.sanitized()?;
        let mut errors = ValidationErrors::new();

        let is_mobile_money = provider.flow() == ProviderFlow::MobileMoney;
        let country = non_empty(Some(form.country.as_str()));

        let currency = if is_mobile_money {
            non_empty(form.currency_code.as_deref())
                .or_else(|| non_empty(Some(form.currency.as_str())))
                .unwrap_or_default()
                .to_uppercase()
        } else {
            form.currency.trim().to_uppercase()
        };
        let currency_field = if is_mobile_money { "currencyCode" } else { "currency" };
        if record(&mut errors, require(currency_field, "Currency", &currency)).is_some() {
            let supported = if is_mobile_money {
                momo::is_supported_currency(&currency)
            } else {
                CHECKOUT_CURRENCIES.contains(&currency.as_str())
            };
            if !supported {
                errors.add(FieldError::new(
                    currency_field,
                    format!("{} is not supported for {}", currency, provider.display_name()),
                ));
            }
        }

        let amount = record(&mut errors, validate_amount("amount", &form.amount));
        record(
            &mut errors,
            require("offeringType", "Offering type", &form.offering_type),
        );
        record(
            &mut errors,
            validate_name("firstName", "First name", &form.first_name),
        );
        record(
            &mut errors,
            validate_name("lastName", "Last name", &form.last_name),
        );
        record(&mut errors, validate_email("email", &form.email));

        let phone_country_code = non_empty(form.phone_country_code.as_deref())
            .map(str::to_string)
            .or_else(|| {
                is_mobile_money
                    .then(|| momo::default_dialing_code(&currency, country))
                    .flatten()
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_DIALING_CODE.to_string());

        let phone = if form.phone.trim().is_empty() {
            None
        } else {
            record(
                &mut errors,
                validate_phone("phone", &form.phone, &phone_country_code),
            )
        };

        let mobile_money = if is_mobile_money {
            let bank_code = non_empty(form.customer_bank_code.as_deref());
            match bank_code {
                None => errors.add(FieldError::new(
                    "customerBankCode",
                    "Mobile money provider is required",
                )),
                Some(code)
                    if !momo::operators_for(&currency, country).is_empty()
                        && !momo::is_known_operator(&currency, country, code) =>
                {
                    errors.add(FieldError::new(
                        "customerBankCode",
                        "Please select a valid mobile money provider",
                    ))
                }
                Some(_) => {}
            }

            let customer_phone = record(
                &mut errors,
                validate_phone(
                    "customerPhoneNumber",
                    form.customer_phone_number.as_deref().unwrap_or_default(),
                    &phone_country_code,
                ),
            );

            match (bank_code, customer_phone) {
                (Some(code), Some(phone_number)) => Some(MobileMoneyDetails {
                    bank_code: code.to_uppercase(),
                    phone_number,
                    dialing_code: phone_country_code.clone(),
                    country_code: momo::iso_country_code(&currency, country).map(str::to_string),
                }),
                _ => None,
            }
        } else {
            None
        };

        if !errors.is_empty() {
            return Err(FormError::Invalid(errors));
        }
        let Some(amount) = amount else {
            return Err(FormError::Invalid(errors));
        };

        Ok(FormSnapshot {
            provider,
            currency,
            amount,
            offering_type: form.offering_type.trim().to_string(),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            email: form.email.trim().to_string(),
            phone,
            phone_country_code,
            comment: form.comment.trim().to_string(),
            mobile_money,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout_form() -> DonationForm {
        DonationForm {
            currency: "NGN".to_string(),
            amount: "5000".to_string(),
            offering_type: "tithe-1".to_string(),
            first_name: "Chidi".to_string(),
            last_name: "Okeke".to_string(),
            email: "chidi@example.com".to_string(),
            ..Default::default()
        }
    }

    fn momo_form() -> DonationForm {
        DonationForm {
            currency_code: Some("GHS".to_string()),
            amount: "250".to_string(),
            offering_type: "offering-2".to_string(),
            first_name: "Ama".to_string(),
            last_name: "Mensah".to_string(),
            email: "ama@example.com".to_string(),
            customer_bank_code: Some("MTN".to_string()),
            customer_phone_number: Some("024 123 4567".to_string()),
            country: "Ghana".to_string(),
            ..Default::default()
        }
    }

    fn invalid(form: &DonationForm, provider: ProviderName) -> ValidationErrors {
        match form.validate(provider) {
            Err(FormError::Invalid(errors)) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn valid_checkout_form_produces_snapshot() {
        let snapshot = checkout_form().validate(ProviderName::Payaza).unwrap();
        assert_eq!(snapshot.currency, "NGN");
        assert_eq!(snapshot.amount, BigDecimal::from(5000));
        assert_eq!(snapshot.phone_country_code, "+234");
        assert_eq!(snapshot.donor_name(), "Chidi Okeke");
        assert!(snapshot.mobile_money.is_none());
        assert_eq!(snapshot.full_phone_number(), "");
    }

    #[test]
    fn optional_phone_is_validated_when_present() {
        let mut form = checkout_form();
        form.phone = "0803 123 4567".to_string();
        let snapshot = form.validate(ProviderName::Payaza).unwrap();
        assert_eq!(snapshot.full_phone_number(), "+2348031234567");

        form.phone_country_code = Some("+233".to_string());
        let errors = invalid(&form, ProviderName::Payaza);
        assert_eq!(
            errors.get("phone"),
            Some("Phone number too long. Expected 9 digits for Ghanaian number (9 digits)")
        );
    }

    #[test]
    fn every_failing_field_is_reported() {
        let form = DonationForm::default();
        let errors = invalid(&form, ProviderName::Payaza);
        assert_eq!(errors.get("currency"), Some("Currency is required"));
        assert_eq!(errors.get("amount"), Some("Amount is required"));
        assert_eq!(errors.get("offeringType"), Some("Offering type is required"));
        assert_eq!(errors.get("firstName"), Some("First name is required"));
        assert_eq!(errors.get("lastName"), Some("Last name is required"));
        assert_eq!(errors.get("email"), Some("Email is required"));
    }

    #[test]
    fn mobile_money_requires_operator_and_handset() {
        let mut form = momo_form();
        form.customer_bank_code = None;
        form.customer_phone_number = None;
        let errors = invalid(&form, ProviderName::MomoPsb);
        assert_eq!(
            errors.get("customerBankCode"),
            Some("Mobile money provider is required")
        );
        assert_eq!(
            errors.get("customerPhoneNumber"),
            Some("Phone number is required")
        );
    }

    #[test]
    fn mobile_money_snapshot_derives_country_and_msisdn() {
        let snapshot = momo_form().validate(ProviderName::MomoPsb).unwrap();
        let details = snapshot.mobile_money.as_ref().unwrap();
        assert_eq!(snapshot.currency, "GHS");
        assert_eq!(details.dialing_code, "+233");
        assert_eq!(details.country_code.as_deref(), Some("GH"));
        assert_eq!(details.msisdn(), "233241234567");
        assert_eq!(snapshot.full_phone_number(), "233241234567");
    }

    #[test]
    fn unsupported_currency_for_provider() {
        let mut form = checkout_form();
        form.currency = "GHS".to_string();
        let errors = invalid(&form, ProviderName::Payaza);
        assert_eq!(errors.get("currency"), Some("GHS is not supported for Payaza"));
    }

    #[test]
    fn sanitization_runs_before_validation() {
        let mut form = checkout_form();
        form.first_name = "<b>Chidi</b>".to_string();
        form.comment = "<script>steal()</script>God is good".to_string();
        let snapshot = form.validate(ProviderName::Payaza).unwrap();
        assert_eq!(snapshot.first_name, "Chidi");
        assert_eq!(snapshot.comment, "God is good");

        form.last_name = "Ok\u{0}eke".to_string();
        assert!(matches!(
            form.validate(ProviderName::Payaza),
            Err(FormError::InvalidInput(_))
        ));
    }
}
