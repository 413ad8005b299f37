use crate::config::MAX_BACKEND_RETRIES;
use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

pub const PK_TOKEN_HEADER: &str = "X-PK-Token";

/// Whether a request may be replayed after a failure.
///
/// Collection creation and completion are never replayed; a replay could
/// create a second collection or finalize one twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Idempotent,
    Once,
}

/// Exponential backoff before retry `attempt + 1`: 1s, 2s, 4s...
pub fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(MAX_BACKEND_RETRIES))
}

#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::ConfigurationError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries: max_retries.min(MAX_BACKEND_RETRIES),
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        pk_token: Option<&str>,
        body: Option<&JsonValue>,
        policy: RetryPolicy,
    ) -> PaymentResult<T> {
        let max_retries = match policy {
            RetryPolicy::Idempotent => self.max_retries,
            RetryPolicy::Once => 0,
        };

        let mut last_error = None;
        for attempt in 0..=max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            if let Some(token) = pk_token {
                request = request.header(PK_TOKEN_HEADER, token);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    PaymentError::TimeoutError {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    PaymentError::NetworkError {
                        message: format!("request to {} failed: {}", url, e),
                    }
                }
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::InvalidResponse {
                                message: format!("invalid JSON from {}: {}", url, e),
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < max_retries {
                            tokio::time::sleep(retry_backoff(attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimitError {
                            message: "collections service rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            url = url,
                            "collections service error, retrying"
                        );
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::GatewayError {
                        status: status.as_u16(),
                        message: error_message_from_body(&text)
                            .unwrap_or_else(|| format!("HTTP {}", status)),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries {
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::NetworkError {
            message: "collections request failed".to_string(),
        }))
    }
}

/// Pulls a human-readable message out of an error body, preferring
/// `message` over `error`.
pub fn error_message_from_body(text: &str) -> Option<String> {
    let value: JsonValue = serde_json::from_str(text).ok()?;
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(JsonValue::as_str))
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(str::to_string)
}

/// Joins a base URL and a relative path with exactly one slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_message_field() {
        assert_eq!(
            error_message_from_body(r#"{"message":"Invalid collection type","error":"Bad Request"}"#),
            Some("Invalid collection type".to_string())
        );
        assert_eq!(
            error_message_from_body(r#"{"error":"Unauthorized"}"#),
            Some("Unauthorized".to_string())
        );
        assert_eq!(error_message_from_body("<html>502</html>"), None);
        assert_eq!(error_message_from_body(r#"{"message":""}"#), None);
    }

    #[test]
    fn backoff_doubles_and_stays_bounded() {
        assert_eq!(retry_backoff(0), Duration::from_secs(1));
        assert_eq!(retry_backoff(2), Duration::from_secs(4));
        assert_eq!(retry_backoff(u32::MAX), retry_backoff(MAX_BACKEND_RETRIES));
    }

    #[test]
    fn client_caps_configured_retries() {
        let client = PaymentHttpClient::new(Duration::from_secs(5), 500).unwrap();
        assert_eq!(client.max_retries, MAX_BACKEND_RETRIES);
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://api.example.org/v1/", "/collections"),
            "https://api.example.org/v1/collections"
        );
        assert_eq!(
            join_url("https://api.example.org", "collections/complete"),
            "https://api.example.org/collections/complete"
        );
    }
}
