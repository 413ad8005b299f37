//! Payment session endpoints

use super::ApiState;
use crate::error::{AppError, AppErrorKind, AppResult, DomainError, InfrastructureError};
use crate::payments::checkout::{CheckoutEvent, CheckoutResponse};
use crate::payments::types::ProviderName;
use crate::services::session::{AttemptSnapshot, PaymentSessionController, PendingCollection};
use crate::validation::DonationForm;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub snapshot: AttemptSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub provider: Option<String>,
    pub form: DonationForm,
}

#[derive(Debug, Serialize)]
pub struct CallbackAccepted {
    pub reference: String,
    pub event: &'static str,
}

/// Live session, or one restored from the attempt store
async fn session(state: &ApiState, id: &str) -> AppResult<PaymentSessionController> {
    let not_found = || AppError::session_not_found(id);
    let session_id = Uuid::parse_str(id).map_err(|_| not_found())?;
    state.registry.resume(&session_id).await?.ok_or_else(not_found)
}

pub async fn create_session(
    State(state): State<ApiState>,
) -> (StatusCode, Json<SessionCreated>) {
    let (session_id, controller) = state.registry.create().await;
    let snapshot = controller.snapshot().await;
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id,
            snapshot,
        }),
    )
}

pub async fn get_session(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> AppResult<Json<AttemptSnapshot>> {
    let controller = session(&state, &id).await?;
    Ok(Json(controller.snapshot().await))
}

pub async fn pending_collection(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> AppResult<Json<Option<PendingCollection>>> {
    let controller = session(&state, &id).await?;
    let pending = controller.pending_collection().await.map_err(|e| {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Cache {
            message: e.to_string(),
        }))
    })?;
    Ok(Json(pending))
}

/// Runs the whole submission. Outcomes the session handled, including
/// validation failures, come back as a snapshot with `lastError` set.
pub async fn submit(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> AppResult<Json<AttemptSnapshot>> {
    let controller = session(&state, &id).await?;
    let provider = request
        .provider
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(ProviderName::from_str)
        .transpose()
        .map_err(|_| AppError::invalid_field("provider", "Please select a supported payment provider"))?;

    Ok(Json(controller.submit(provider, request.form).await))
}

pub async fn confirm(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> AppResult<Json<AttemptSnapshot>> {
    let controller = session(&state, &id).await?;
    Ok(Json(controller.confirm_payment().await))
}

pub async fn abandon(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> AppResult<Json<AttemptSnapshot>> {
    let controller = session(&state, &id).await?;
    Ok(Json(controller.abandon().await))
}

pub async fn close_session(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let session_id = Uuid::parse_str(&id).map_err(|_| AppError::session_not_found(&id))?;
    if state.registry.remove(&session_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::session_not_found(id))
    }
}

/// Widget result posted back by the donor's browser
pub async fn checkout_callback(
    State(state): State<ApiState>,
    Path(reference): Path<String>,
    Json(response): Json<CheckoutResponse>,
) -> AppResult<(StatusCode, Json<CallbackAccepted>)> {
    relay(&state, reference, CheckoutEvent::from_callback(response)).await
}

pub async fn checkout_close(
    State(state): State<ApiState>,
    Path(reference): Path<String>,
) -> AppResult<(StatusCode, Json<CallbackAccepted>)> {
    relay(&state, reference, CheckoutEvent::Cancelled).await
}

async fn relay(
    state: &ApiState,
    reference: String,
    event: CheckoutEvent,
) -> AppResult<(StatusCode, Json<CallbackAccepted>)> {
    let event_name = event.name();
    if !state.relay.deliver(&reference, event).await {
        return Err(AppError::new(AppErrorKind::Domain(
            DomainError::CheckoutNotFound { reference },
        )));
    }
    info!(reference = %reference, event = event_name, "checkout callback accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(CallbackAccepted {
            reference,
            event: event_name,
        }),
    ))
}
