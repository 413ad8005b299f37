//! Donation checkout workflow.
//!
//! Turns a submitted gift into a confirmed or definitively failed collection:
//! validates donor input, creates the pending collection, hands off to the
//! selected payment provider and reconciles the provider's signal with the
//! backend's completion status.

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod payments;
pub mod services;
pub mod validation;
pub mod workers;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod middleware;
