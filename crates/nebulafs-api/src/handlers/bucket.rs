//! Bucket operation handlers.

use axum::extract::State;
use axum::response::Json;
use axum::Extension;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use nebulafs_core::error::ErrorCode;
use nebulafs_core::is_safe_name;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::RequestContext;

#[derive(Debug, Deserialize)]
struct CreateBucketRequest {
    name: String,
}

/// `POST /v1/buckets` - Create a bucket.
pub async fn create_bucket(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: CreateBucketRequest = serde_json::from_slice(&body)
        .map_err(|e| ctx.error(ErrorCode::InvalidJson, e.to_string()))?;

    if !is_safe_name(&request.name) {
        return Err(ctx.error(ErrorCode::InvalidName, "invalid bucket name"));
    }

    let bucket = state.metadata.create_bucket(&request.name).map_err(|e| ctx.failure(e))?;
    Ok(Json(json!({ "name": bucket.name })))
}

/// `GET /v1/buckets` - List buckets ordered by name.
pub async fn list_buckets(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let buckets = state.metadata.list_buckets().map_err(|e| ctx.failure(e))?;

    let entries: Vec<_> = buckets
        .into_iter()
        .map(|b| json!({ "name": b.name, "created_at": b.created_at }))
        .collect();
    Ok(Json(json!({ "buckets": entries })))
}
