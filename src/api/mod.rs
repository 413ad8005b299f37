//! HTTP surface for the donation checkout
//!
//! Sessions are created by the donor's browser; every later call addresses
//! the session by id. Hosted checkout callbacks are relayed by transaction
//! reference.

pub mod collections;
pub mod sessions;

use crate::health::HealthChecker;
use crate::payments::checkout::RelayCheckout;
use crate::services::catalog::CatalogService;
use crate::services::session::SessionRegistry;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<SessionRegistry>,
    pub relay: Arc<RelayCheckout>,
    pub catalog: CatalogService,
    pub health: HealthChecker,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(collections::health))
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/{id}",
            get(sessions::get_session).delete(sessions::close_session),
        )
        .route("/api/sessions/{id}/pending", get(sessions::pending_collection))
        .route("/api/sessions/{id}/submit", post(sessions::submit))
        .route("/api/sessions/{id}/confirm", post(sessions::confirm))
        .route("/api/sessions/{id}/attempt", delete(sessions::abandon))
        .route(
            "/api/checkout/{reference}/callback",
            post(sessions::checkout_callback),
        )
        .route(
            "/api/checkout/{reference}/close",
            post(sessions::checkout_close),
        )
        .route("/api/collection-types", get(collections::collection_types))
        .route("/api/collections/{collection_no}", get(collections::get_collection))
        .route("/api/bank-accounts", get(collections::bank_accounts))
        .with_state(state)
}
