//! Read-only lookups: offering types, bank transfer details, collection history

use super::ApiState;
use crate::error::{AppError, AppErrorKind, AppResult, DomainError};
use crate::health::HealthStatus;
use crate::payments::error::PaymentError;
use crate::payments::types::{BankAccount, BankAccountScope, CollectionRecord, CollectionType};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountsQuery {
    pub scope: Option<String>,
    pub collection_type_id: Option<String>,
}

pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthStatus>) {
    let status = state.health.check_health().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

pub async fn collection_types(State(state): State<ApiState>) -> Json<Vec<CollectionType>> {
    Json(state.catalog.collection_types().await)
}

pub async fn bank_accounts(
    State(state): State<ApiState>,
    Query(query): Query<BankAccountsQuery>,
) -> AppResult<Json<Vec<BankAccount>>> {
    let scope = match query.scope.as_deref() {
        Some(scope) => BankAccountScope::from_str(scope)?,
        None => BankAccountScope::Local,
    };
    let collection_type_id = query
        .collection_type_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::invalid_field("collectionTypeId", "Please select an offering type"))?;

    let accounts = state
        .catalog
        .bank_accounts(scope, &collection_type_id)
        .await?;
    Ok(Json(accounts))
}

pub async fn get_collection(
    State(state): State<ApiState>,
    Path(collection_no): Path<String>,
) -> AppResult<Json<CollectionRecord>> {
    match state.catalog.lookup_collection(&collection_no).await {
        Ok(record) => Ok(Json(record)),
        Err(PaymentError::GatewayError { status: 404, .. }) => Err(AppError::new(
            AppErrorKind::Domain(DomainError::CollectionNotFound { collection_no }),
        )),
        Err(e) => Err(e.into()),
    }
}
