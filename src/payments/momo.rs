//! Mobile money catalog: supported currencies, operators and the country
//! mapping the collections backend expects.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MomoCurrency {
    pub code: &'static str,
    pub country: &'static str,
    pub dialing_code: &'static str,
    pub iso_country: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MobileOperator {
    pub name: &'static str,
    pub code: &'static str,
}

pub const MOMO_CURRENCIES: &[MomoCurrency] = &[
    MomoCurrency {
        code: "GHS",
        country: "Ghana",
        dialing_code: "+233",
        iso_country: "GH",
    },
    MomoCurrency {
        code: "XAF",
        country: "Cameroon",
        dialing_code: "+237",
        iso_country: "CM",
    },
    MomoCurrency {
        code: "XAF",
        country: "Cote d'Ivoire",
        dialing_code: "+225",
        iso_country: "CI",
    },
    MomoCurrency {
        code: "UGX",
        country: "Uganda",
        dialing_code: "+256",
        iso_country: "UG",
    },
    MomoCurrency {
        code: "TZS",
        country: "Tanzania",
        dialing_code: "+255",
        iso_country: "TZ",
    },
    MomoCurrency {
        code: "SLE",
        country: "Sierra Leone",
        dialing_code: "+232",
        iso_country: "SL",
    },
];

const GHANA_OPERATORS: &[MobileOperator] = &[
    MobileOperator { name: "MTN Mobile Money", code: "MTN" },
    MobileOperator { name: "Vodafone Cash", code: "VOD" },
    MobileOperator { name: "AirtelTigo Money", code: "AIR" },
];

const KENYA_OPERATORS: &[MobileOperator] = &[MobileOperator { name: "M-Pesa", code: "SAFKEN" }];

const CAMEROON_OPERATORS: &[MobileOperator] = &[
    MobileOperator { name: "MTN Mobile Money", code: "MTNCMR" },
    MobileOperator { name: "Orange Money", code: "ORACMR" },
];

const BENIN_OPERATORS: &[MobileOperator] = &[
    MobileOperator { name: "Moov Money", code: "MOOBEN" },
    MobileOperator { name: "MTN Mobile Money", code: "MTNBEN" },
];

const COTE_DIVOIRE_OPERATORS: &[MobileOperator] = &[
    MobileOperator { name: "MTN Mobile Money", code: "MOMCIV" },
    MobileOperator { name: "Orange Money", code: "MOMCIV" },
    MobileOperator { name: "Moov Money", code: "MOMCIV" },
    MobileOperator { name: "Wave", code: "WAVCIV" },
];

const UGANDA_OPERATORS: &[MobileOperator] = &[
    MobileOperator { name: "MTN Mobile Money", code: "MTNUGA" },
    MobileOperator { name: "Airtel Money", code: "AIRUGA" },
];

const TANZANIA_OPERATORS: &[MobileOperator] = &[
    MobileOperator { name: "Tigo Pesa", code: "TIGTZA" },
    MobileOperator { name: "Airtel Money", code: "AIRTZA" },
    MobileOperator { name: "Halopesa", code: "HALTZA" },
];

const SIERRA_LEONE_OPERATORS: &[MobileOperator] =
    &[MobileOperator { name: "Orange Money", code: "ORASLE" }];

fn is_cameroon(country: Option<&str>) -> bool {
    country.is_some_and(|c| c.trim().eq_ignore_ascii_case("Cameroon"))
}

fn is_benin(country: Option<&str>) -> bool {
    country.is_some_and(|c| {
        let c = c.trim();
        c.eq_ignore_ascii_case("Republic of Benin") || c.eq_ignore_ascii_case("Benin")
    })
}

pub fn is_supported_currency(code: &str) -> bool {
    let code = code.trim().to_uppercase();
    MOMO_CURRENCIES.iter().any(|c| c.code == code)
}

/// Operators available for a currency. XAF and XOF are shared by several
/// countries, so `country` picks the list.
pub fn operators_for(currency: &str, country: Option<&str>) -> &'static [MobileOperator] {
    match currency.trim().to_uppercase().as_str() {
        "GHS" => GHANA_OPERATORS,
        "KES" => KENYA_OPERATORS,
        "XAF" if is_cameroon(country) => CAMEROON_OPERATORS,
        "XAF" => COTE_DIVOIRE_OPERATORS,
        "XOF" if is_benin(country) => BENIN_OPERATORS,
        "XOF" => COTE_DIVOIRE_OPERATORS,
        "UGX" => UGANDA_OPERATORS,
        "TZS" => TANZANIA_OPERATORS,
        "SLE" => SIERRA_LEONE_OPERATORS,
        _ => &[],
    }
}

pub fn is_known_operator(currency: &str, country: Option<&str>, bank_code: &str) -> bool {
    operators_for(currency, country)
        .iter()
        .any(|op| op.code.eq_ignore_ascii_case(bank_code.trim()))
}

/// ISO country code sent to the backend as `countryCode`
pub fn iso_country_code(currency: &str, country: Option<&str>) -> Option<&'static str> {
    match currency.trim().to_uppercase().as_str() {
        "GHS" => Some("GH"),
        "KES" => Some("KE"),
        "XOF" if is_benin(country) => Some("BJ"),
        "XOF" => Some("CI"),
        "XAF" if is_cameroon(country) => Some("CM"),
        "XAF" => Some("CI"),
        "UGX" => Some("UG"),
        "TZS" => Some("TZ"),
        "SLE" => Some("SL"),
        _ => None,
    }
}

pub fn default_dialing_code(currency: &str, country: Option<&str>) -> Option<&'static str> {
    match currency.trim().to_uppercase().as_str() {
        "GHS" => Some("+233"),
        "KES" => Some("+254"),
        "XOF" if is_benin(country) => Some("+229"),
        "XOF" => Some("+225"),
        "XAF" if is_cameroon(country) => Some("+237"),
        "XAF" => Some("+225"),
        "UGX" => Some("+256"),
        "TZS" => Some("+255"),
        "SLE" => Some("+232"),
        _ => None,
    }
}

/// International number without the plus sign, e.g. `233241234567`.
pub fn msisdn(dialing_code: &str, local_number: &str) -> String {
    format!("{}{}", dialing_code.trim().trim_start_matches('+'), local_number)
}
