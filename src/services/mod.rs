//! Services module for business logic and integrations

pub mod catalog;
pub mod notification;
pub mod session;

pub use catalog::CatalogService;
pub use notification::{Notification, NotificationLevel, NotificationService};
pub use session::{
    AttemptSnapshot, AttemptStatus, PaymentSessionController, SessionConfig, SessionError,
    SessionRegistry,
};
