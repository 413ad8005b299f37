use crate::payments::error::PaymentResult;
use crate::payments::gateway::CollectionGateway;
use crate::payments::types::{BankAccount, BankAccountScope, CollectionRecord, CollectionType};
use std::sync::Arc;
use tracing::{info, warn};

/// Offering types shown when the backend list cannot be loaded
pub const FALLBACK_COLLECTION_TYPES: &[(&str, &str)] = &[
    ("tithe", "Tithe"),
    ("offering", "Offering"),
    ("seed-offering", "Seed Offering"),
    ("special-offering", "Special Offering"),
    ("building-fund", "Building Fund"),
    ("missions", "Missions"),
];

pub fn fallback_collection_types() -> Vec<CollectionType> {
    FALLBACK_COLLECTION_TYPES
        .iter()
        .map(|(id, name)| CollectionType {
            id: id.to_string(),
            name: name.to_string(),
            status: true,
        })
        .collect()
}

/// Read-only lookups backing the donation form and history screens
#[derive(Clone)]
pub struct CatalogService {
    gateway: Arc<dyn CollectionGateway>,
}

impl CatalogService {
    pub fn new(gateway: Arc<dyn CollectionGateway>) -> Self {
        Self { gateway }
    }

    /// Active offering types. Falls back to a fixed list when the backend
    /// is unreachable or returns nothing.
    pub async fn collection_types(&self) -> Vec<CollectionType> {
        match self.gateway.list_collection_types().await {
            Ok(types) => {
                let active: Vec<_> = types.into_iter().filter(|t| t.status).collect();
                if active.is_empty() {
                    warn!("no active collection types returned, using fallback list");
                    return fallback_collection_types();
                }
                active
            }
            Err(e) => {
                warn!(error = %e, "failed to load collection types, using fallback list");
                fallback_collection_types()
            }
        }
    }

    pub async fn bank_accounts(
        &self,
        scope: BankAccountScope,
        collection_type_id: &str,
    ) -> PaymentResult<Vec<BankAccount>> {
        let accounts = self
            .gateway
            .list_bank_accounts(scope, collection_type_id)
            .await?;
        info!(
            scope = scope.path_segment(),
            collection_type_id = collection_type_id,
            count = accounts.len(),
            "bank accounts loaded"
        );
        Ok(accounts)
    }

    pub async fn lookup_collection(&self, collection_no: &str) -> PaymentResult<CollectionRecord> {
        self.gateway.fetch_collection(collection_no).await
    }
}
