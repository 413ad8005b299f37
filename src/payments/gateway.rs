use crate::config::BackendConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{
    BankAccount, BankAccountScope, CollectionCreated, CollectionRecord, CollectionType,
    CompleteCollectionRequest, CreateCollectionRequest, ListEnvelope,
};
use crate::payments::utils::{join_url, PaymentHttpClient, RetryPolicy};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, instrument};

/// The collections backend
#[async_trait]
pub trait CollectionGateway: Send + Sync {
    /// Creates a pending collection. Never retried.
    async fn create_collection(
        &self,
        request: &CreateCollectionRequest,
    ) -> PaymentResult<CollectionCreated>;

    /// Asks the backend to finalize a collection. The body is returned as-is
    /// so the caller can tell a well-formed answer from an unreadable one.
    async fn complete_collection(&self, collection_no: &str) -> PaymentResult<JsonValue>;

    async fn fetch_collection(&self, collection_no: &str) -> PaymentResult<CollectionRecord>;

    async fn list_collection_types(&self) -> PaymentResult<Vec<CollectionType>>;

    async fn list_bank_accounts(
        &self,
        scope: BankAccountScope,
        collection_type_id: &str,
    ) -> PaymentResult<Vec<BankAccount>>;
}

pub struct HttpCollectionGateway {
    base_url: String,
    pk_token: Option<String>,
    http: PaymentHttpClient,
}

impl HttpCollectionGateway {
    pub fn new(config: &BackendConfig) -> PaymentResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(PaymentError::ConfigurationError {
                message: "collections base URL is empty".to_string(),
            });
        }
        Ok(Self {
            base_url: config.base_url.trim().to_string(),
            pk_token: config.pk_token.clone(),
            http: PaymentHttpClient::new(
                Duration::from_secs(config.timeout_secs),
                config.max_retries,
            )?,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[async_trait]
impl CollectionGateway for HttpCollectionGateway {
    #[instrument(skip(self, request), fields(reference = %request.collection_reference, gateway = %request.payment_gateway))]
    async fn create_collection(
        &self,
        request: &CreateCollectionRequest,
    ) -> PaymentResult<CollectionCreated> {
        let body = serde_json::to_value(request).map_err(|e| PaymentError::ValidationError {
            message: format!("collection request could not be encoded: {}", e),
            field: None,
        })?;

        let created: CollectionCreated = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.url("collections"),
                self.pk_token.as_deref(),
                Some(&body),
                RetryPolicy::Once,
            )
            .await?;

        if created.collection_no.trim().is_empty() {
            return Err(PaymentError::InvalidResponse {
                message: "collection created without a collection number".to_string(),
            });
        }

        info!(collection_no = %created.collection_no, "collection created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn complete_collection(&self, collection_no: &str) -> PaymentResult<JsonValue> {
        let body = serde_json::to_value(CompleteCollectionRequest {
            collection_no: collection_no.to_string(),
        })
        .map_err(|e| PaymentError::ValidationError {
            message: format!("completion request could not be encoded: {}", e),
            field: None,
        })?;

        self.http
            .request_json(
                reqwest::Method::PUT,
                &self.url("collections/complete"),
                self.pk_token.as_deref(),
                Some(&body),
                RetryPolicy::Once,
            )
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_collection(&self, collection_no: &str) -> PaymentResult<CollectionRecord> {
        let collection_no = collection_no.trim();
        if collection_no.is_empty() {
            return Err(PaymentError::ValidationError {
                message: "Please enter a collection number".to_string(),
                field: Some("collectionNo".to_string()),
            });
        }

        self.http
            .request_json(
                reqwest::Method::GET,
                &self.url(&format!("collections/{}", collection_no)),
                self.pk_token.as_deref(),
                None,
                RetryPolicy::Idempotent,
            )
            .await
    }

    async fn list_collection_types(&self) -> PaymentResult<Vec<CollectionType>> {
        let envelope: ListEnvelope<CollectionType> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.url("collection-types"),
                self.pk_token.as_deref(),
                None,
                RetryPolicy::Idempotent,
            )
            .await?;
        Ok(envelope.into_items())
    }

    async fn list_bank_accounts(
        &self,
        scope: BankAccountScope,
        collection_type_id: &str,
    ) -> PaymentResult<Vec<BankAccount>> {
        let url = format!(
            "{}?pageNumber=0&pageSize=100&collectionTypeId={}",
            self.url(&format!("bank-accounts/{}", scope.path_segment())),
            collection_type_id.trim()
        );
        let envelope: ListEnvelope<BankAccount> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &url,
                self.pk_token.as_deref(),
                None,
                RetryPolicy::Idempotent,
            )
            .await?;
        Ok(envelope.into_items())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            pk_token: Some("pk-test".to_string()),
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    #[test]
    fn empty_base_url_is_a_configuration_error() {
        assert!(matches!(
            HttpCollectionGateway::new(&backend("  ")),
            Err(PaymentError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn urls_are_joined_against_base() {
        let gateway = HttpCollectionGateway::new(&backend("https://api.example.org/")).unwrap();
        assert_eq!(
            gateway.url("collections/complete"),
            "https://api.example.org/collections/complete"
        );
    }

    #[tokio::test]
    async fn blank_collection_number_is_rejected_before_any_request() {
        let gateway = HttpCollectionGateway::new(&backend("http://127.0.0.1:9")).unwrap();
        let err = gateway.fetch_collection("   ").await.unwrap_err();
        assert_eq!(err.user_message(), "Please enter a collection number");
    }
}
