//! Request logging with per-request ids

use super::error::get_request_id_from_headers;
use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Id of the request being handled on this task, if any
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Issues a v4 UUID for every request without an `x-request-id`
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let request_id = get_request_id_from_headers(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id.as_deref().unwrap_or("-"),
        method = %method,
        path = %path
    );
    let start = Instant::now();

    let handled = next.run(request).instrument(span.clone());
    let response = match request_id {
        Some(id) => REQUEST_ID.scope(id, handled).await,
        None => handled.await,
    };

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;
    span.in_scope(|| {
        if response.status().is_server_error() {
            warn!(status, latency_ms, "request failed");
        } else {
            info!(status, latency_ms, "request completed");
        }
    });

    response
}
