use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

/// A donor-facing message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        Self
    }

    /// Builds a donor-facing notification and records it in the log.
    pub fn notify(
        &self,
        collection_no: Option<&str>,
        level: NotificationLevel,
        message: impl Into<String>,
    ) -> Notification {
        let message = message.into();
        let collection_no = collection_no.unwrap_or("-");
        match level {
            NotificationLevel::Success => {
                info!(collection_no = collection_no, "NOTIFICATION: {}", message);
            }
            NotificationLevel::Info => {
                info!(collection_no = collection_no, "notice: {}", message);
            }
            NotificationLevel::Error => {
                warn!(collection_no = collection_no, "NOTIFICATION FAILED: {}", message);
            }
        }

        Notification {
            level,
            message,
            at: Utc::now(),
        }
    }
}
