#![allow(dead_code)]

use async_trait::async_trait;
use giving_checkout::config::CheckoutSettings;
use giving_checkout::payments::checkout::{CheckoutLauncher, RelayCheckout};
use giving_checkout::payments::error::{PaymentError, PaymentResult};
use giving_checkout::payments::gateway::CollectionGateway;
use giving_checkout::payments::types::{
    BankAccount, BankAccountScope, CollectionCreated, CollectionRecord, CollectionType,
    CreateCollectionRequest,
};
use giving_checkout::payments::ConnectionMode;
use giving_checkout::services::session::{
    AttemptSnapshot, AttemptStatus, MemoryAttemptStore, PaymentSessionController, SessionConfig,
};
use giving_checkout::validation::DonationForm;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const COLLECTION_NO: &str = "COL-2024-0001";

pub fn completed_body() -> JsonValue {
    json!({
        "collection": { "collectionNo": COLLECTION_NO, "collectionStatus": "Successful" },
        "transactionStatus": { "transaction_status": "Completed" }
    })
}

pub fn pending_transaction_body() -> JsonValue {
    json!({
        "collection": { "collectionStatus": "Successful" },
        "transactionStatus": { "transaction_status": "Pending" }
    })
}

/// Scripted collections backend
pub struct MockGateway {
    pub create_result: Mutex<PaymentResult<CollectionCreated>>,
    /// Served in order; once drained every call answers with `completed_body`
    pub complete_results: Mutex<VecDeque<PaymentResult<JsonValue>>>,
    pub complete_delay: Mutex<Duration>,
    pub collection_types: Mutex<PaymentResult<Vec<CollectionType>>>,
    pub requests: Mutex<Vec<CreateCollectionRequest>>,
    pub create_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            create_result: Mutex::new(Ok(CollectionCreated {
                collection_no: COLLECTION_NO.to_string(),
            })),
            complete_results: Mutex::new(VecDeque::new()),
            complete_delay: Mutex::new(Duration::ZERO),
            collection_types: Mutex::new(Ok(Vec::new())),
            requests: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_create(&self, error: PaymentError) {
        *self.create_result.lock().unwrap() = Err(error);
    }

    pub fn push_completion(&self, result: PaymentResult<JsonValue>) {
        self.complete_results.lock().unwrap().push_back(result);
    }

    pub fn set_complete_delay(&self, delay: Duration) {
        *self.complete_delay.lock().unwrap() = delay;
    }

    pub fn set_collection_types(&self, result: PaymentResult<Vec<CollectionType>>) {
        *self.collection_types.lock().unwrap() = result;
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CreateCollectionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CollectionGateway for MockGateway {
    async fn create_collection(
        &self,
        request: &CreateCollectionRequest,
    ) -> PaymentResult<CollectionCreated> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.create_result.lock().unwrap().clone()
    }

    async fn complete_collection(&self, _collection_no: &str) -> PaymentResult<JsonValue> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.complete_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let next = self.complete_results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(completed_body()))
    }

    async fn fetch_collection(&self, collection_no: &str) -> PaymentResult<CollectionRecord> {
        Err(PaymentError::GatewayError {
            status: 404,
            message: format!("Collection {} not found", collection_no),
            retryable: false,
        })
    }

    async fn list_collection_types(&self) -> PaymentResult<Vec<CollectionType>> {
        self.collection_types.lock().unwrap().clone()
    }

    async fn list_bank_accounts(
        &self,
        _scope: BankAccountScope,
        _collection_type_id: &str,
    ) -> PaymentResult<Vec<BankAccount>> {
        Ok(Vec::new())
    }
}

pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub relay: Arc<RelayCheckout>,
    pub store: MemoryAttemptStore,
    pub controller: PaymentSessionController,
}

pub fn session_config(merchant_key: Option<&str>) -> SessionConfig {
    SessionConfig {
        completion_timeout: Duration::from_secs(30),
        receipt_delay: Duration::from_millis(2_000),
        checkout: CheckoutSettings {
            merchant_key: merchant_key.map(str::to_string),
            connection_mode: ConnectionMode::Test,
        },
    }
}

pub fn harness() -> Harness {
    harness_with(session_config(Some("PZ78-PKTEST-0001")))
}

pub fn harness_with(config: SessionConfig) -> Harness {
    let gateway = Arc::new(MockGateway::new());
    let relay = Arc::new(RelayCheckout::new());
    let store = MemoryAttemptStore::new();
    let launcher: Arc<dyn CheckoutLauncher> = relay.clone();
    let controller = PaymentSessionController::new(
        gateway.clone(),
        launcher,
        Arc::new(store.scoped("session:test")),
        config,
    );
    Harness {
        gateway,
        relay,
        store,
        controller,
    }
}

pub fn checkout_form() -> DonationForm {
    DonationForm {
        currency: "NGN".to_string(),
        amount: "5000".to_string(),
        offering_type: "tithe-1".to_string(),
        first_name: "Chidi".to_string(),
        last_name: "Okeke".to_string(),
        email: "chidi@example.com".to_string(),
        phone: "0803 123 4567".to_string(),
        ..Default::default()
    }
}

pub fn momo_form() -> DonationForm {
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

/// Polls until the session reaches `status`
pub async fn wait_for(controller: &PaymentSessionController, status: AttemptStatus) -> AttemptSnapshot {
    for _ in 0..500 {
        let snapshot = controller.snapshot().await;
        if snapshot.status == status {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "session never reached {}, stuck at {}",
        status,
        controller.snapshot().await.status
    );
}
