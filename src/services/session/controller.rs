//! Payment session controller
//!
//! Drives one donor's attempt from submission to a verdict:
//!
//! ```text
//! not_started -> collection_created -> awaiting_provider ----------> completing
//!                                   \-> awaiting_user_confirmation -/    |
//!                                                      succeeded | failed | indeterminate
//! ```
//!
//! Every state can be reset to `not_started`. A reset bumps the session
//! epoch; completion results that arrive for an older epoch are discarded.
//!
//! The attempt is persisted while it is unconfirmed. A controller built over
//! the same store after a restart can [`restore`](PaymentSessionController::restore) it.

use super::error::{SessionError, SessionResult};
use super::guard::IdempotencyGuard;
use super::resolver::{resolve_completion, Resolution};
use super::store::{AttemptKey, AttemptStore, StoreError};
use super::types::{
    AttemptSnapshot, AttemptStatus, DonationAttempt, PendingCollection, Receipt,
};
use crate::config::{CheckoutSettings, SessionSettings};
use crate::logging::{mask_email, mask_phone};
use crate::payments::checkout::{CheckoutConfig, CheckoutEvent, CheckoutLauncher, CheckoutSession};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::CollectionGateway;
use crate::payments::types::{CreateCollectionRequest, ProviderFlow, ProviderName};
use crate::services::notification::{Notification, NotificationLevel, NotificationService};
use crate::validation::{DonationForm, FormSnapshot};
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Length of the random part of a transaction reference
pub const REFERENCE_LEN: usize = 16;
pub const MOMO_REFERENCE_PREFIX: &str = "MOMO_";

const CHECKOUT_SUCCESS_MESSAGE: &str = "Payment completed successfully!";
const MOMO_SUCCESS_MESSAGE: &str = "Payment verified successfully!";
const MOMO_INITIATED_MESSAGE: &str =
    "Mobile money payment initiated! Please complete on your device.";
const ALREADY_VERIFYING_MESSAGE: &str = "This payment is already being verified";
const RESTORED_MESSAGE: &str =
    "You have an unconfirmed gift. Confirm it to check whether the payment went through.";

/// Processed markers outlive the completion timeout by this factor
const MARKER_TTL_FACTOR: u32 = 2;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on a completion request
    pub completion_timeout: Duration,
    /// Mobile money receipts are withheld this long after success
    pub receipt_delay: Duration,
    pub checkout: CheckoutSettings,
}

impl SessionConfig {
    pub fn new(settings: &SessionSettings, checkout: &CheckoutSettings) -> Self {
        Self {
            completion_timeout: settings.completion_timeout(),
            receipt_delay: settings.receipt_delay(),
            checkout: checkout.clone(),
        }
    }

    /// How long a processed marker survives a process that never released it
    pub fn marker_ttl(&self) -> Duration {
        self.completion_timeout * MARKER_TTL_FACTOR
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(&SessionSettings::default(), &CheckoutSettings::default())
    }
}

// ============================================================================
// Request Builders
// ============================================================================

/// Fresh transaction reference: 16 upper-case hex characters, prefixed for
/// mobile money.
pub fn generate_reference(provider: ProviderName) -> String {
    let token: String = Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(REFERENCE_LEN)
        .collect();

    match provider.flow() {
        ProviderFlow::MobileMoney => format!("{}{}", MOMO_REFERENCE_PREFIX, token),
        ProviderFlow::ExternalCheckout => token,
    }
}

pub fn build_collection_request(form: &FormSnapshot, reference: &str) -> CreateCollectionRequest {
    let momo = form.mobile_money.as_ref();
    CreateCollectionRequest {
        payment_gateway: form.provider.gateway_id().to_string(),
        currency: form.currency.clone(),
        amount: form.amount.clone(),
        collection_type_id: form.offering_type.clone(),
        collection_reference: reference.to_string(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        email: form.email.clone(),
        phone_number: form.full_phone_number(),
        phone_country_code: form.phone_country_code.clone(),
        comment: form.comment.clone(),
        customer_number: momo.map(|m| m.msisdn()),
        customer_bank_code: momo.map(|m| m.bank_code.clone()),
        country_code: momo.and_then(|m| m.country_code.clone()),
    }
}

fn build_checkout_config(
    settings: &CheckoutSettings,
    attempt: &DonationAttempt,
) -> CheckoutConfig {
    let form = &attempt.form;
    CheckoutConfig {
        merchant_key: settings.merchant_key.clone().unwrap_or_default(),
        connection_mode: settings.connection_mode,
        checkout_amount: form.amount.clone(),
        currency: form.currency.clone(),
        email_address: form.email.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        phone_number: form.full_phone_number(),
        transaction_reference: attempt.reference.clone(),
    }
}

// ============================================================================
// Session State
// ============================================================================

struct SessionState {
    epoch: u64,
    status: AttemptStatus,
    attempt: Option<DonationAttempt>,
    checkout: Option<CheckoutConfig>,
    notifications: Vec<Notification>,
    last_error: Option<SessionError>,
    receipt: Option<Receipt>,
    checkout_listener: Option<JoinHandle<()>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            epoch: 0,
            status: AttemptStatus::NotStarted,
            attempt: None,
            checkout: None,
            notifications: Vec::new(),
            last_error: None,
            receipt: None,
            checkout_listener: None,
        }
    }

    fn transition(&mut self, next: AttemptStatus) {
        let attempt = self.attempt.as_ref();
        let collection_no = attempt.map(|a| a.collection_no.as_str()).unwrap_or("-");
        let reference = attempt.map(|a| a.reference.as_str()).unwrap_or("-");
        let provider = attempt.map(|a| a.provider.as_str()).unwrap_or("-");

        if !self.status.can_transition_to(next) {
            warn!(
                from = %self.status,
                to = %next,
                collection_no = collection_no,
                reference = reference,
                provider = provider,
                "unexpected attempt transition"
            );
        }
        debug!(
            from = %self.status,
            to = %next,
            epoch = self.epoch,
            collection_no = collection_no,
            reference = reference,
            provider = provider,
            "attempt transition"
        );
        self.status = next;
    }

    fn collection_no(&self) -> Option<&str> {
        self.attempt.as_ref().map(|a| a.collection_no.as_str())
    }

    fn snapshot(&self) -> AttemptSnapshot {
        AttemptSnapshot {
            epoch: self.epoch,
            status: self.status,
            provider: self.attempt.as_ref().map(|a| a.provider),
            reference: self.attempt.as_ref().map(|a| a.reference.clone()),
            collection_no: self.attempt.as_ref().map(|a| a.collection_no.clone()),
            checkout: self.checkout.clone(),
            notifications: self.notifications.clone(),
            last_error: self.last_error.clone(),
            receipt: self.receipt.clone(),
        }
    }
}

/// Everything a completion needs once the state lock is released
struct CompletionTicket {
    epoch: u64,
    collection_no: String,
    reference: String,
    provider: ProviderName,
}

enum CompletionOutcome {
    Answered(PaymentResult<JsonValue>),
    TimedOut,
    Cancelled,
}

fn store_error(e: StoreError) -> SessionError {
    SessionError::Store {
        message: e.to_string(),
    }
}

async fn cancelled(rx: &mut watch::Receiver<u64>, epoch: u64) {
    loop {
        if *rx.borrow_and_update() != epoch {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

struct Inner {
    gateway: Arc<dyn CollectionGateway>,
    checkout: Arc<dyn CheckoutLauncher>,
    store: Arc<dyn AttemptStore>,
    guard: IdempotencyGuard,
    notifier: NotificationService,
    config: SessionConfig,
    state: Mutex<SessionState>,
    submit_lock: Mutex<()>,
    epoch_tx: watch::Sender<u64>,
}

/// One donor's payment session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PaymentSessionController {
    inner: Arc<Inner>,
}

impl PaymentSessionController {
    pub fn new(
        gateway: Arc<dyn CollectionGateway>,
        checkout: Arc<dyn CheckoutLauncher>,
        store: Arc<dyn AttemptStore>,
        config: SessionConfig,
    ) -> Self {
        let (epoch_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                gateway,
                checkout,
                guard: IdempotencyGuard::new(Arc::clone(&store), config.marker_ttl()),
                store,
                notifier: NotificationService::new(),
                config,
                state: Mutex::new(SessionState::new()),
                submit_lock: Mutex::new(()),
                epoch_tx,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub async fn snapshot(&self) -> AttemptSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    /// A collection recorded by an earlier, interrupted attempt
    pub async fn pending_collection(&self) -> SessionResult<Option<PendingCollection>> {
        let collection_no = self
            .inner
            .store
            .get(&AttemptKey::CurrentCollectionNo)
            .await
            .map_err(store_error)?;
        let Some(collection_no) = collection_no else {
            return Ok(None);
        };
        let reference = self
            .inner
            .store
            .get(&AttemptKey::CurrentCollectionReference)
            .await
            .map_err(store_error)?;

        Ok(Some(PendingCollection {
            collection_no,
            reference,
        }))
    }

    /// Picks up an attempt persisted by an earlier process. `None` means the
    /// store holds nothing for this session.
    ///
    /// Mobile money attempts wait for the donor's confirmation again. A
    /// hosted checkout window does not survive a restart, so those attempts
    /// come back indeterminate and can be re-checked.
    pub async fn restore(&self) -> Result<Option<AttemptSnapshot>, StoreError> {
        let store = &self.inner.store;
        let Some(collection_no) = store.get(&AttemptKey::CurrentCollectionNo).await? else {
            return Ok(None);
        };

        let mut state = self.inner.state.lock().await;
        if state.attempt.is_some() {
            return Ok(Some(state.snapshot()));
        }

        let stored = store.get(&AttemptKey::CurrentAttempt).await?;
        let attempt = stored
            .as_deref()
            .and_then(|json| match serde_json::from_str::<DonationAttempt>(json) {
                Ok(attempt) => Some(attempt),
                Err(e) => {
                    warn!(collection_no = %collection_no, error = %e, "stored attempt unreadable");
                    None
                }
            })
            .filter(|attempt| attempt.collection_no == collection_no);

        let Some(attempt) = attempt else {
            warn!(collection_no = %collection_no, "persisted collection has no attempt details");
            return Ok(Some(state.snapshot()));
        };

        let status = match attempt.provider.flow() {
            ProviderFlow::MobileMoney => AttemptStatus::AwaitingUserConfirmation,
            ProviderFlow::ExternalCheckout => AttemptStatus::Indeterminate,
        };
        info!(
            collection_no = %attempt.collection_no,
            reference = %attempt.reference,
            provider = %attempt.provider,
            status = %status,
            "attempt restored"
        );
        state.attempt = Some(attempt);
        state.status = status;
        self.notify(&mut state, NotificationLevel::Info, RESTORED_MESSAGE);

        Ok(Some(state.snapshot()))
    }

    /// Lets go of in-process resources: the checkout window, its listener
    /// and the notification log. Persisted identifiers stay so an
    /// unconfirmed attempt can still be restored. Returns false while a
    /// submission or completion is running.
    pub async fn suspend(&self) -> bool {
        let Ok(_submitting) = self.inner.submit_lock.try_lock() else {
            return false;
        };
        let mut state = self.inner.state.lock().await;
        if state.status == AttemptStatus::Completing {
            return false;
        }

        state.epoch += 1;
        self.inner.epoch_tx.send_replace(state.epoch);
        if let Some(attempt) = state.attempt.as_ref() {
            self.inner.checkout.dismiss(&attempt.reference).await;
        }
        if let Some(listener) = state.checkout_listener.take() {
            listener.abort();
        }
        state.notifications.clear();
        debug!(status = %state.status, epoch = state.epoch, "session suspended");
        true
    }

    // ------------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------------

    /// Validates the form, creates the collection and hands off to the
    /// provider. At most one submission runs at a time.
    pub async fn submit(&self, provider: Option<ProviderName>, form: DonationForm) -> AttemptSnapshot {
        let Ok(_submitting) = self.inner.submit_lock.try_lock() else {
            let mut state = self.inner.state.lock().await;
            debug!("submission already in progress");
            self.notify(
                &mut state,
                NotificationLevel::Info,
                "Your payment is already being started",
            );
            return state.snapshot();
        };

        let epoch = {
            let mut state = self.inner.state.lock().await;
            if state.status != AttemptStatus::NotStarted {
                let current = state.status;
                self.record_error(
                    &mut state,
                    SessionError::InvalidState {
                        current,
                        action: "submit".to_string(),
                    },
                );
                return state.snapshot();
            }
            state.last_error = None;
            state.epoch
        };

        let (provider, form) = match self.prepare(provider, &form) {
            Ok(prepared) => prepared,
            Err(error) => {
                let mut state = self.inner.state.lock().await;
                if state.epoch == epoch {
                    self.record_error(&mut state, error);
                }
                return state.snapshot();
            }
        };

        let reference = generate_reference(provider);
        let request = build_collection_request(&form, &reference);
        info!(
            provider = %provider,
            reference = %reference,
            currency = %form.currency,
            amount = %form.amount,
            email = %mask_email(&form.email),
            phone = %mask_phone(&form.full_phone_number()),
            "creating collection"
        );

        let created = self.inner.gateway.create_collection(&request).await;

        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            warn!(reference = %reference, "session reset while collection was being created");
            return state.snapshot();
        }

        let created = match created {
            Ok(created) => created,
            Err(e) => {
                error!(provider = %provider, reference = %reference, error = %e, "collection creation failed");
                self.clear_identifiers().await;
                let error = match e {
                    PaymentError::ConfigurationError { message } => {
                        SessionError::Configuration { message }
                    }
                    other => SessionError::CollectionCreation {
                        provider,
                        message: other.user_message(),
                    },
                };
                self.record_error(&mut state, error);
                return state.snapshot();
            }
        };

        let attempt = DonationAttempt {
            reference,
            collection_no: created.collection_no,
            provider,
            form,
            created_at: Utc::now(),
        };
        self.persist_identifiers(&attempt).await;
        state.attempt = Some(attempt);
        state.transition(AttemptStatus::CollectionCreated);

        match provider.flow() {
            ProviderFlow::MobileMoney => {
                state.transition(AttemptStatus::AwaitingUserConfirmation);
                self.notify(&mut state, NotificationLevel::Success, MOMO_INITIATED_MESSAGE);
            }
            ProviderFlow::ExternalCheckout => self.open_checkout(&mut state).await,
        }

        state.snapshot()
    }

    fn prepare(
        &self,
        provider: Option<ProviderName>,
        form: &DonationForm,
    ) -> SessionResult<(ProviderName, FormSnapshot)> {
        let provider = provider.ok_or(SessionError::MissingProvider)?;
        let snapshot = form.validate(provider)?;

        if provider.flow() == ProviderFlow::ExternalCheckout
            && self.inner.config.checkout.merchant_key.is_none()
        {
            return Err(SessionError::Configuration {
                message: "checkout merchant key is not set".to_string(),
            });
        }

        Ok((provider, snapshot))
    }

    async fn open_checkout(&self, state: &mut SessionState) {
        let Some(attempt) = state.attempt.as_ref() else {
            return;
        };
        let config = build_checkout_config(&self.inner.config.checkout, attempt);

        match self.inner.checkout.launch(&config).await {
            Ok(session) => {
                state.transition(AttemptStatus::AwaitingProvider);
                let listener =
                    self.spawn_checkout_listener(config.transaction_reference.clone(), session);
                state.checkout = Some(config);
                state.checkout_listener = Some(listener);
            }
            Err(e) => {
                error!(reference = %config.transaction_reference, error = %e, "checkout could not be opened");
                state.attempt = None;
                self.clear_identifiers().await;
                state.transition(AttemptStatus::NotStarted);
                let error = match e {
                    PaymentError::ConfigurationError { message } => {
                        SessionError::Configuration { message }
                    }
                    other => SessionError::CheckoutLaunch {
                        message: other.to_string(),
                    },
                };
                self.record_error(state, error);
            }
        }
    }

    fn spawn_checkout_listener(&self, reference: String, mut session: CheckoutSession) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(event) = session.events.recv().await {
                controller.on_checkout_event(&reference, event).await;
            }
            debug!(reference = %reference, "checkout listener stopped");
        })
    }

    // ------------------------------------------------------------------------
    // Provider Signals
    // ------------------------------------------------------------------------

    /// Handles a hosted checkout callback for `reference`. Callbacks for any
    /// other reference are ignored.
    pub async fn on_checkout_event(&self, reference: &str, event: CheckoutEvent) -> AttemptSnapshot {
        let mut state = self.inner.state.lock().await;
        let matches = state
            .attempt
            .as_ref()
            .is_some_and(|a| a.reference == reference);
        if !matches {
            debug!(reference = reference, event = event.name(), "callback for another attempt ignored");
            return state.snapshot();
        }

        match event {
            CheckoutEvent::Cancelled => {
                if state.status == AttemptStatus::AwaitingProvider {
                    info!(reference = reference, "checkout closed before payment");
                    self.reset(&mut state).await;
                    self.notify(&mut state, NotificationLevel::Info, "Payment window closed");
                } else {
                    debug!(status = %state.status, "checkout close ignored");
                }
                state.snapshot()
            }
            CheckoutEvent::Failure(response) => {
                if state.status != AttemptStatus::AwaitingProvider {
                    debug!(status = %state.status, "checkout failure ignored");
                    return state.snapshot();
                }
                warn!(reference = reference, status = ?response.status, "checkout reported failure");
                self.clear_identifiers().await;
                state.transition(AttemptStatus::Failed);
                self.record_error(&mut state, SessionError::CheckoutFailed);
                state.snapshot()
            }
            CheckoutEvent::Success(_) => {
                if !matches!(
                    state.status,
                    AttemptStatus::AwaitingProvider | AttemptStatus::Failed
                ) {
                    debug!(status = %state.status, "checkout success ignored");
                    return state.snapshot();
                }
                if !self.inner.guard.consume_reference(reference).await {
                    debug!(reference = reference, "duplicate checkout success suppressed");
                    return state.snapshot();
                }
                info!(reference = reference, "checkout reported success");

                match self.begin_completion(&mut state).await {
                    Some(ticket) => {
                        drop(state);
                        self.finish_completion(ticket).await
                    }
                    None => state.snapshot(),
                }
            }
        }
    }

    /// The donor says they approved the payment, or asks to re-check one
    /// that failed or could not be confirmed.
    pub async fn confirm_payment(&self) -> AttemptSnapshot {
        let mut state = self.inner.state.lock().await;

        if state.status == AttemptStatus::Completing {
            self.notify(&mut state, NotificationLevel::Info, ALREADY_VERIFYING_MESSAGE);
            return state.snapshot();
        }
        if state.attempt.is_none() || !state.status.allows_verification() {
            let current = state.status;
            self.record_error(
                &mut state,
                SessionError::InvalidState {
                    current,
                    action: "verify payment".to_string(),
                },
            );
            return state.snapshot();
        }

        match self.begin_completion(&mut state).await {
            Some(ticket) => {
                drop(state);
                self.finish_completion(ticket).await
            }
            None => state.snapshot(),
        }
    }

    /// Abandons the attempt: cancels any in-flight completion, releases the
    /// guard and clears persisted identifiers.
    pub async fn abandon(&self) -> AttemptSnapshot {
        let mut state = self.inner.state.lock().await;
        self.reset(&mut state).await;
        state.snapshot()
    }

    // ------------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------------

    async fn begin_completion(&self, state: &mut SessionState) -> Option<CompletionTicket> {
        let (collection_no, reference, provider) = match state.attempt.as_ref() {
            Some(a) => (a.collection_no.clone(), a.reference.clone(), a.provider),
            None => return None,
        };

        match self.inner.guard.try_acquire(&collection_no).await {
            Ok(true) => {}
            Ok(false) => {
                info!(collection_no = %collection_no, "completion already claimed; request suppressed");
                self.notify(state, NotificationLevel::Info, ALREADY_VERIFYING_MESSAGE);
                return None;
            }
            Err(e) => {
                error!(collection_no = %collection_no, error = %e, "could not claim collection");
                self.record_error(state, store_error(e));
                return None;
            }
        }

        state.transition(AttemptStatus::Completing);
        state.last_error = None;

        Some(CompletionTicket {
            epoch: state.epoch,
            collection_no,
            reference,
            provider,
        })
    }

    /// Runs the completion on its own task so a dropped caller cannot leave
    /// the guard held.
    async fn finish_completion(&self, ticket: CompletionTicket) -> AttemptSnapshot {
        let epoch = ticket.epoch;
        let collection_no = ticket.collection_no.clone();
        let controller = self.clone();

        match tokio::spawn(async move { controller.run_completion(ticket).await }).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(collection_no = %collection_no, error = %e, "completion task failed");
                self.inner.guard.release(&collection_no).await;
                let mut state = self.inner.state.lock().await;
                if state.epoch == epoch && state.status == AttemptStatus::Completing {
                    state.transition(AttemptStatus::Indeterminate);
                    self.record_error(
                        &mut state,
                        SessionError::CompletionTransport {
                            message: e.to_string(),
                        },
                    );
                }
                state.snapshot()
            }
        }
    }

    async fn run_completion(&self, ticket: CompletionTicket) -> AttemptSnapshot {
        let mut epoch_rx = self.inner.epoch_tx.subscribe();
        let timeout = self.inner.config.completion_timeout;

        info!(collection_no = %ticket.collection_no, reference = %ticket.reference, "completing collection");

        let outcome = tokio::select! {
            result = self.inner.gateway.complete_collection(&ticket.collection_no) => {
                CompletionOutcome::Answered(result)
            }
            _ = tokio::time::sleep(timeout) => CompletionOutcome::TimedOut,
            _ = cancelled(&mut epoch_rx, ticket.epoch) => CompletionOutcome::Cancelled,
        };

        self.apply_completion(ticket, outcome).await
    }

    async fn apply_completion(
        &self,
        ticket: CompletionTicket,
        outcome: CompletionOutcome,
    ) -> AttemptSnapshot {
        let mut state = self.inner.state.lock().await;

        if matches!(outcome, CompletionOutcome::Cancelled)
            || state.epoch != ticket.epoch
            || state.status != AttemptStatus::Completing
        {
            debug!(
                collection_no = %ticket.collection_no,
                epoch = ticket.epoch,
                current_epoch = state.epoch,
                "completion result discarded"
            );
            return state.snapshot();
        }

        let timeout_secs = self.inner.config.completion_timeout.as_secs();
        let resolution = match outcome {
            CompletionOutcome::Answered(Ok(body)) => Ok(resolve_completion(&body)),
            CompletionOutcome::Answered(Err(PaymentError::TimeoutError { .. }))
            | CompletionOutcome::TimedOut => Err(SessionError::CompletionTimeout {
                seconds: timeout_secs,
            }),
            CompletionOutcome::Answered(Err(e)) => Err(SessionError::CompletionTransport {
                message: e.to_string(),
            }),
            CompletionOutcome::Cancelled => return state.snapshot(),
        };

        self.inner.guard.release(&ticket.collection_no).await;

        match resolution {
            Ok(Resolution::Succeeded) => self.succeed(&mut state, &ticket).await,
            Ok(Resolution::Failed(reason)) => {
                warn!(collection_no = %ticket.collection_no, reason = %reason, "collection not completed");
                self.clear_identifiers().await;
                state.transition(AttemptStatus::Failed);
                self.record_error(&mut state, SessionError::CompletionMismatch { reason });
            }
            Ok(Resolution::Indeterminate(cause)) => {
                warn!(collection_no = %ticket.collection_no, cause = ?cause, "completion response unreadable");
                state.transition(AttemptStatus::Indeterminate);
                self.record_error(&mut state, SessionError::UnreadableCompletion);
            }
            Err(error) => {
                warn!(collection_no = %ticket.collection_no, error = %error, "completion outcome unknown");
                state.transition(AttemptStatus::Indeterminate);
                self.record_error(&mut state, error);
            }
        }

        state.snapshot()
    }

    async fn succeed(&self, state: &mut SessionState, ticket: &CompletionTicket) {
        self.clear_identifiers().await;
        self.inner.checkout.dismiss(&ticket.reference).await;

        let now = Utc::now();
        let visible_at = match ticket.provider.flow() {
            ProviderFlow::MobileMoney => {
                now + chrono::Duration::from_std(self.inner.config.receipt_delay)
                    .unwrap_or_else(|_| chrono::Duration::zero())
            }
            ProviderFlow::ExternalCheckout => now,
        };

        if let Some(attempt) = state.attempt.as_ref() {
            state.receipt = Some(Receipt {
                donor_name: attempt.form.donor_name(),
                transaction_reference: attempt.reference.clone(),
                collection_no: attempt.collection_no.clone(),
                amount: attempt.form.amount.to_string(),
                currency: attempt.form.currency.clone(),
                offering_type: attempt.form.offering_type.clone(),
                issued_at: now,
                visible_at,
            });
        }

        state.transition(AttemptStatus::Succeeded);
        state.last_error = None;
        let message = match ticket.provider.flow() {
            ProviderFlow::MobileMoney => MOMO_SUCCESS_MESSAGE,
            ProviderFlow::ExternalCheckout => CHECKOUT_SUCCESS_MESSAGE,
        };
        info!(collection_no = %ticket.collection_no, reference = %ticket.reference, "donation confirmed");
        self.notify(state, NotificationLevel::Success, message);
    }

    // ------------------------------------------------------------------------
    // Reset & Persistence
    // ------------------------------------------------------------------------

    async fn reset(&self, state: &mut SessionState) {
        let previous = state.status;
        state.epoch += 1;
        self.inner.epoch_tx.send_replace(state.epoch);

        if let Some(attempt) = state.attempt.take() {
            self.inner.checkout.dismiss(&attempt.reference).await;
            self.inner.guard.release(&attempt.collection_no).await;
        }
        self.inner.guard.forget_references().await;
        self.clear_identifiers().await;

        state.transition(AttemptStatus::NotStarted);
        state.checkout = None;
        state.receipt = None;
        state.last_error = None;
        state.notifications.clear();
        info!(from = %previous, epoch = state.epoch, "attempt reset");

        // Last: the listener may be the caller, and abort lands on its next await.
        if let Some(listener) = state.checkout_listener.take() {
            listener.abort();
        }
    }

    async fn persist_identifiers(&self, attempt: &DonationAttempt) {
        let details = match serde_json::to_string(attempt) {
            Ok(json) => json,
            Err(e) => {
                warn!(collection_no = %attempt.collection_no, error = %e, "attempt not serializable");
                String::new()
            }
        };
        let writes = [
            (AttemptKey::CurrentAttempt, details.as_str()),
            (AttemptKey::CurrentCollectionNo, attempt.collection_no.as_str()),
            (AttemptKey::CurrentCollectionReference, attempt.reference.as_str()),
        ];
        for (key, value) in writes {
            if let Err(e) = self.inner.store.set(&key, value).await {
                warn!(key = %key.name(), error = %e, "failed to persist attempt identifier");
            }
        }
    }

    async fn clear_identifiers(&self) {
        for key in [
            AttemptKey::CurrentCollectionNo,
            AttemptKey::CurrentCollectionReference,
            AttemptKey::CurrentAttempt,
        ] {
            if let Err(e) = self.inner.store.remove(&key).await {
                warn!(key = %key.name(), error = %e, "failed to clear attempt identifier");
            }
        }
    }

    fn notify(&self, state: &mut SessionState, level: NotificationLevel, message: impl Into<String>) {
        let notification = self
            .inner
            .notifier
            .notify(state.collection_no(), level, message);
        state.notifications.push(notification);
    }

    fn record_error(&self, state: &mut SessionState, error: SessionError) {
        self.notify(state, NotificationLevel::Error, error.user_message());
        state.last_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::MobileMoneyDetails;
    use bigdecimal::BigDecimal;

    fn snapshot(provider: ProviderName) -> FormSnapshot {
        FormSnapshot {
            provider,
            currency: "GHS".to_string(),
            amount: BigDecimal::from(250),
            offering_type: "offering-2".to_string(),
            first_name: "Ama".to_string(),
            last_name: "Mensah".to_string(),
            email: "ama@example.com".to_string(),
            phone: None,
            phone_country_code: "+233".to_string(),
            comment: String::new(),
            mobile_money: Some(MobileMoneyDetails {
                bank_code: "MTN".to_string(),
                phone_number: "241234567".to_string(),
                dialing_code: "+233".to_string(),
                country_code: Some("GH".to_string()),
            }),
        }
    }

    #[test]
    fn references_are_sixteen_hex_characters() {
        let reference = generate_reference(ProviderName::Payaza);
        assert_eq!(reference.len(), REFERENCE_LEN);
        assert!(reference
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));

        let momo = generate_reference(ProviderName::MomoPsb);
        assert!(momo.starts_with(MOMO_REFERENCE_PREFIX));
        assert_eq!(momo.len(), MOMO_REFERENCE_PREFIX.len() + REFERENCE_LEN);
        assert_ne!(generate_reference(ProviderName::Payaza), reference);
    }

    #[test]
    fn mobile_money_request_carries_operator_and_msisdn() {
        let request = build_collection_request(&snapshot(ProviderName::MomoPsb), "MOMO_0123");
        assert_eq!(request.payment_gateway, "MOMO_PSB");
        assert_eq!(request.customer_bank_code.as_deref(), Some("MTN"));
        assert_eq!(request.customer_number.as_deref(), Some("233241234567"));
        assert_eq!(request.phone_number, "233241234567");
        assert_eq!(request.country_code.as_deref(), Some("GH"));
        assert_eq!(request.collection_type_id, "offering-2");
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn transitions_log_the_attempt_identity() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let mut state = SessionState::new();
        state.attempt = Some(DonationAttempt {
            reference: "MOMO_0123456789ABCDEF".to_string(),
            collection_no: "COL-42".to_string(),
            provider: ProviderName::MomoPsb,
            form: snapshot(ProviderName::MomoPsb),
            created_at: Utc::now(),
        });
        tracing::subscriber::with_default(subscriber, || {
            state.transition(AttemptStatus::CollectionCreated);
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("attempt transition"), "{}", output);
        assert!(output.contains("collection_no") && output.contains("COL-42"), "{}", output);
        assert!(output.contains("MOMO_0123456789ABCDEF"), "{}", output);
        assert!(output.contains("provider") && output.contains("momo_psb"), "{}", output);
    }

    #[test]
    fn checkout_config_mirrors_the_attempt() {
        let mut form = snapshot(ProviderName::Payaza);
        form.mobile_money = None;
        form.currency = "NGN".to_string();
        let attempt = DonationAttempt {
            reference: "0123456789ABCDEF".to_string(),
            collection_no: "COL-1".to_string(),
            provider: ProviderName::Payaza,
            form,
            created_at: Utc::now(),
        };
        let settings = CheckoutSettings {
            merchant_key: Some("PZ78-PKLIVE".to_string()),
            connection_mode: crate::payments::ConnectionMode::Live,
        };

        let config = build_checkout_config(&settings, &attempt);
        assert_eq!(config.transaction_reference, "0123456789ABCDEF");
        assert_eq!(config.merchant_key, "PZ78-PKLIVE");
        assert_eq!(config.checkout_amount, BigDecimal::from(250));
        assert_eq!(config.currency, "NGN");
    }
}
