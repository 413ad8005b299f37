//! Hosted checkout hand-off.
//!
//! A [`CheckoutLauncher`] opens the provider's payment window and returns a
//! channel of [`CheckoutEvent`]s. [`RelayCheckout`] is the server-side
//! launcher: the browser widget posts its callbacks to us and they are
//! relayed onto the channel registered for that transaction reference.

use crate::payments::error::{PaymentError, PaymentResult};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 8;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionMode {
    #[default]
    Test,
    Live,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::Test => "Test",
            ConnectionMode::Live => "Live",
        }
    }
}

impl std::str::FromStr for ConnectionMode {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "test" => Ok(ConnectionMode::Test),
            "live" => Ok(ConnectionMode::Live),
            _ => Err(PaymentError::ConfigurationError {
                message: format!("unknown checkout connection mode: {}", value),
            }),
        }
    }
}

/// Everything the hosted checkout widget needs to open
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CheckoutConfig {
    pub merchant_key: String,
    pub connection_mode: ConnectionMode,
    pub checkout_amount: BigDecimal,
    pub currency: String,
    pub email_address: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub transaction_reference: String,
}

/// Payload the checkout widget reports back with
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckoutResponse {
    #[serde(default)]
    pub status: Option<JsonValue>,
    #[serde(flatten)]
    pub details: Map<String, JsonValue>,
}

impl CheckoutResponse {
    pub fn with_status(status: JsonValue) -> Self {
        Self {
            status: Some(status),
            details: Map::new(),
        }
    }

    /// A string status of `success` or any 2xx numeric status.
    pub fn is_success(&self) -> bool {
        match &self.status {
            Some(JsonValue::String(s)) => s.trim().eq_ignore_ascii_case("success"),
            Some(JsonValue::Number(n)) => n.as_u64().is_some_and(|code| (200..300).contains(&code)),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutEvent {
    Success(CheckoutResponse),
    Failure(CheckoutResponse),
    Cancelled,
}

impl CheckoutEvent {
    pub fn from_callback(response: CheckoutResponse) -> Self {
        if response.is_success() {
            CheckoutEvent::Success(response)
        } else {
            CheckoutEvent::Failure(response)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CheckoutEvent::Success(_) => "success",
            CheckoutEvent::Failure(_) => "failure",
            CheckoutEvent::Cancelled => "cancelled",
        }
    }
}

/// An open checkout window
pub struct CheckoutSession {
    pub events: mpsc::Receiver<CheckoutEvent>,
}

#[async_trait]
pub trait CheckoutLauncher: Send + Sync {
    async fn launch(&self, config: &CheckoutConfig) -> PaymentResult<CheckoutSession>;

    /// Closes the window for `reference`; later callbacks are dropped.
    async fn dismiss(&self, reference: &str);
}

#[derive(Default)]
pub struct RelayCheckout {
    channels: RwLock<HashMap<String, mpsc::Sender<CheckoutEvent>>>,
}

impl RelayCheckout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a widget callback to the session waiting on `reference`.
    /// Returns false when no window is open for it.
    pub async fn deliver(&self, reference: &str, event: CheckoutEvent) -> bool {
        let sender = self.channels.read().await.get(reference).cloned();
        let Some(sender) = sender else {
            debug!(reference = reference, event = event.name(), "no open checkout for callback");
            return false;
        };

        let event_name = event.name();
        if sender.send(event).await.is_err() {
            warn!(reference = reference, "checkout listener went away");
            self.channels.write().await.remove(reference);
            return false;
        }
        info!(reference = reference, event = event_name, "checkout callback relayed");
        true
    }

    pub async fn is_open(&self, reference: &str) -> bool {
        self.channels.read().await.contains_key(reference)
    }
}

#[async_trait]
impl CheckoutLauncher for RelayCheckout {
    async fn launch(&self, config: &CheckoutConfig) -> PaymentResult<CheckoutSession> {
        if config.merchant_key.trim().is_empty() {
            return Err(PaymentError::ConfigurationError {
                message: "checkout merchant key is not set".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let mut channels = self.channels.write().await;
        if channels.contains_key(&config.transaction_reference) {
            return Err(PaymentError::ValidationError {
                message: format!(
                    "checkout already open for {}",
                    config.transaction_reference
                ),
                field: Some("transaction_reference".to_string()),
            });
        }
        channels.insert(config.transaction_reference.clone(), tx);

        info!(
            reference = %config.transaction_reference,
            mode = config.connection_mode.as_str(),
            "checkout window opened"
        );
        Ok(CheckoutSession { events: rx })
    }

    async fn dismiss(&self, reference: &str) {
        if self.channels.write().await.remove(reference).is_some() {
            debug!(reference = reference, "checkout window dismissed");
        }
    }
}
