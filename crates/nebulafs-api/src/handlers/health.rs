//! Health, readiness, and metrics endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use serde_json::json;

use crate::handlers::AppState;
use crate::middleware::RequestContext;

/// `GET /healthz` - liveness probe. Public.
pub async fn healthz(Extension(ctx): Extension<RequestContext>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "request_id": ctx.request_id }))
}

/// `GET /readyz` - readiness probe. Public.
pub async fn readyz(Extension(ctx): Extension<RequestContext>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ready", "request_id": ctx.request_id }))
}

/// `GET /metrics` - Prometheus exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics.as_ref().map(|handle| handle.render()).unwrap_or_default();
    (StatusCode::OK, [("Content-Type", "text/plain; version=0.0.4")], body).into_response()
}
