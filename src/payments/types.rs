use crate::payments::error::PaymentError;
use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// How a provider hands control back once a collection exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFlow {
    /// A hosted checkout that reports success, failure or close.
    ExternalCheckout,
    /// A push to the donor's handset; the donor confirms here afterwards.
    MobileMoney,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Payaza,
    MomoPsb,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Payaza => "payaza",
            ProviderName::MomoPsb => "momo_psb",
        }
    }

    /// Identifier the collections backend expects in `paymentGateway`
    pub fn gateway_id(&self) -> &'static str {
        match self {
            ProviderName::Payaza => "PAYAZA",
            ProviderName::MomoPsb => "MOMO_PSB",
        }
    }

    pub fn flow(&self) -> ProviderFlow {
        match self {
            ProviderName::Payaza => ProviderFlow::ExternalCheckout,
            ProviderName::MomoPsb => ProviderFlow::MobileMoney,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderName::Payaza => "Payaza",
            ProviderName::MomoPsb => "MOMO PSB",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "payaza" => Ok(ProviderName::Payaza),
            "momo" | "momo_psb" | "momo-psb" | "momopsb" => Ok(ProviderName::MomoPsb),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported provider: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

fn serialize_amount<S: Serializer>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
    let value = amount
        .to_f64()
        .ok_or_else(|| serde::ser::Error::custom(format!("amount out of range: {}", amount)))?;
    serializer.serialize_f64(value)
}

/// Body of `POST collections`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    pub payment_gateway: String,
    pub currency: String,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: BigDecimal,
    pub collection_type_id: String,
    pub collection_reference: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub phone_country_code: String,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_bank_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionCreated {
    pub collection_no: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompleteCollectionRequest {
    pub collection_no: String,
}

/// A collection as returned by `GET collections/{collectionNo}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub collection_no: String,
    #[serde(default)]
    pub collection_status: Option<String>,
    #[serde(default)]
    pub collection_reference: Option<String>,
    #[serde(default)]
    pub amount: Option<JsonValue>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_gateway: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub collection_type: Option<CollectionType>,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transaction_status: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub response: Option<JsonValue>,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionType {
    pub id: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub status: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BankAccountScope {
    Local,
    International,
}

impl BankAccountScope {
    pub fn path_segment(&self) -> &'static str {
        match self {
            BankAccountScope::Local => "local",
            BankAccountScope::International => "international",
        }
    }
}

impl FromStr for BankAccountScope {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "local" => Ok(BankAccountScope::Local),
            "international" => Ok(BankAccountScope::International),
            _ => Err(PaymentError::ValidationError {
                message: format!("unknown bank account scope: {}", value),
                field: Some("scope".to_string()),
            }),
        }
    }
}

/// Transfer destination for donors who prefer to pay by bank
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub swift_code: Option<String>,
    #[serde(default)]
    pub sort_code: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
}

/// Paged list envelope used by the catalog endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Bare(Vec<T>),
    Paged {
        #[serde(alias = "data", alias = "items")]
        content: Vec<T>,
    },
}

impl<T> ListEnvelope<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListEnvelope::Bare(items) => items,
            ListEnvelope::Paged { content } => content,
        }
    }
}
