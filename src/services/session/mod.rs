//! Donation payment sessions: the attempt state machine, its idempotency
//! guard and the completion resolver.

pub mod controller;
pub mod error;
pub mod guard;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod types;

pub use controller::{PaymentSessionController, SessionConfig};
pub use error::{ErrorCategory, SessionError, SessionResult};
pub use guard::IdempotencyGuard;
pub use registry::{SessionRegistry, StoreProvider};
pub use resolver::{classify, resolve_completion, IndeterminateCause, MismatchReason, Resolution};
pub use store::{AttemptKey, AttemptStore, MemoryAttemptStore, StoreError};
pub use types::{AttemptSnapshot, AttemptStatus, DonationAttempt, PendingCollection, Receipt};
