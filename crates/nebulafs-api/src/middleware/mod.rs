//! Axum middleware for request context, logging, and metrics.

use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use nebulafs_core::error::{Error as CoreError, ErrorCode};

use crate::error::ApiError;
use crate::metrics::record_request;

/// Per-request context carried through request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Opaque unique request id, echoed as `X-Request-Id`.
    pub request_id: String,
}

impl RequestContext {
    /// Create a context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self { request_id: Uuid::new_v4().to_string() }
    }

    /// Build an API error bound to this request.
    #[must_use]
    pub fn error(&self, code: ErrorCode, message: impl Into<String>) -> ApiError {
        ApiError::new(code, message, &self.request_id)
    }

    /// Convert a core error into an API error bound to this request.
    #[must_use]
    pub fn failure(&self, err: CoreError) -> ApiError {
        ApiError::from_core(err, &self.request_id)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-context middleware.
///
/// Assigns a fresh request id, times the request, emits the structured
/// request log line and metrics, and stamps the `Server` and `X-Request-Id`
/// response headers.
pub async fn request_context_layer(mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let ctx = RequestContext::new();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    request.extensions_mut().insert(ctx.clone());
    let mut response = next.run(request).await;

    let status = response.status().as_u16();
    let latency = start.elapsed();

    let headers = response.headers_mut();
    headers.insert("server", HeaderValue::from_static("NebulaFS"));
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        headers.insert("x-request-id", value);
    }

    tracing::info!(
        request_id = %ctx.request_id,
        method = %method,
        path = %path,
        status,
        latency_ms = latency.as_millis() as u64,
        "request"
    );
    record_request(status, latency);

    response
}
