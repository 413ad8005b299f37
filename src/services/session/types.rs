use crate::payments::checkout::CheckoutConfig;
use crate::payments::types::ProviderName;
use crate::services::notification::Notification;
use crate::services::session::error::SessionError;
use crate::validation::FormSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Attempt State Machine
// ============================================================================

/// Where a donation attempt stands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// No collection exists for this session
    NotStarted,
    /// Backend collection created, provider not yet engaged
    CollectionCreated,
    /// Hosted checkout open, waiting for its callback
    AwaitingProvider,
    /// Mobile money push sent, waiting for the donor to confirm here
    AwaitingUserConfirmation,
    /// Completion request in flight
    Completing,
    Succeeded,
    /// Backend reported a definite mismatch or the checkout failed
    Failed,
    /// Outcome unknown: timed out, unreadable or never answered
    Indeterminate,
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::NotStarted => write!(f, "not_started"),
            AttemptStatus::CollectionCreated => write!(f, "collection_created"),
            AttemptStatus::AwaitingProvider => write!(f, "awaiting_provider"),
            AttemptStatus::AwaitingUserConfirmation => write!(f, "awaiting_user_confirmation"),
            AttemptStatus::Completing => write!(f, "completing"),
            AttemptStatus::Succeeded => write!(f, "succeeded"),
            AttemptStatus::Failed => write!(f, "failed"),
            AttemptStatus::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

impl AttemptStatus {
    /// Get all valid transitions from this state
    pub fn valid_transitions(&self) -> &'static [AttemptStatus] {
        use AttemptStatus::*;
        match self {
            NotStarted => &[CollectionCreated, NotStarted],
            CollectionCreated => &[AwaitingProvider, AwaitingUserConfirmation, NotStarted],
            AwaitingProvider => &[Completing, Failed, NotStarted],
            AwaitingUserConfirmation => &[Completing, NotStarted],
            Completing => &[Succeeded, Failed, Indeterminate, NotStarted],
            Succeeded => &[NotStarted],
            // Verification may be retried from either end state
            Failed => &[Completing, NotStarted],
            Indeterminate => &[Completing, NotStarted],
        }
    }

    pub fn can_transition_to(&self, next: AttemptStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptStatus::Succeeded | AttemptStatus::Failed | AttemptStatus::Indeterminate
        )
    }

    /// States from which the donor may ask us to verify the payment
    pub fn allows_verification(&self) -> bool {
        matches!(
            self,
            AttemptStatus::AwaitingUserConfirmation
                | AttemptStatus::Failed
                | AttemptStatus::Indeterminate
        )
    }
}

// ============================================================================
// Attempt Data
// ============================================================================

/// One donation attempt, created once the backend has issued a collection.
/// Persisted as JSON so a restarted process can pick it up again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationAttempt {
    pub reference: String,
    pub collection_no: String,
    pub provider: ProviderName,
    pub form: FormSnapshot,
    pub created_at: DateTime<Utc>,
}

/// Confirmation shown after a verified payment
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub donor_name: String,
    pub transaction_reference: String,
    pub collection_no: String,
    pub amount: String,
    pub currency: String,
    pub offering_type: String,
    pub issued_at: DateTime<Utc>,
    /// The receipt is withheld until this instant
    pub visible_at: DateTime<Utc>,
}

impl Receipt {
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.visible_at
    }
}

/// A collection left behind by an interrupted attempt
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingCollection {
    pub collection_no: String,
    pub reference: Option<String>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSnapshot {
    pub epoch: u64,
    pub status: AttemptStatus,
    pub provider: Option<ProviderName>,
    pub reference: Option<String>,
    pub collection_no: Option<String>,
    pub checkout: Option<CheckoutConfig>,
    pub notifications: Vec<Notification>,
    pub last_error: Option<SessionError>,
    pub receipt: Option<Receipt>,
}

impl AttemptSnapshot {
    pub fn last_notification(&self) -> Option<&Notification> {
        self.notifications.last()
    }
}
