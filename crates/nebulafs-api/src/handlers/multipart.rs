//! Multipart upload handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::Extension;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use nebulafs_core::error::ErrorCode;
use nebulafs_storage::multipart::CompletePart;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::RequestContext;

#[derive(Debug, Deserialize)]
struct InitiateRequest {
    object: String,
}

#[derive(Debug, Deserialize)]
struct CompleteRequest {
    #[serde(default)]
    parts: Vec<CompleteRequestPart>,
}

#[derive(Debug, Deserialize)]
struct CompleteRequestPart {
    part_number: i64,
    #[serde(default)]
    etag: String,
}

/// `POST /v1/buckets/{bucket}/multipart-uploads` - Initiate an upload.
pub async fn initiate_upload(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(bucket): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: InitiateRequest = serde_json::from_slice(&body)
        .map_err(|e| ctx.error(ErrorCode::InvalidJson, e.to_string()))?;

    let initiated =
        state.multipart.initiate(&bucket, &request.object).map_err(|e| ctx.failure(e))?;

    Ok(Json(json!({
        "upload_id": initiated.upload_id,
        "object": initiated.object,
        "expires_at": initiated.expires_at,
    })))
}

/// `PUT /v1/buckets/{bucket}/multipart-uploads/{upload_id}/parts/{part_number}`
/// - Streaming part upload.
pub async fn upload_part(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((bucket, upload_id, part_number)): Path<(String, String, String)>,
    body: Body,
) -> Result<Json<serde_json::Value>, ApiError> {
    let part_number: u32 = match part_number.parse() {
        Ok(n) if n > 0 => n,
        _ => {
            return Err(ctx.error(
                ErrorCode::InvalidPartNumber,
                "part_number must be a positive integer",
            ));
        }
    };

    let part = state
        .multipart
        .upload_part(
            &bucket,
            &upload_id,
            part_number,
            body.into_data_stream(),
            state.max_body_bytes(),
        )
        .await
        .map_err(|e| ctx.failure(e))?;

    Ok(Json(json!({
        "upload_id": part.upload_id,
        "part_number": part.part_number,
        "etag": part.etag,
        "size": part.size_bytes,
    })))
}

/// `GET /v1/buckets/{bucket}/multipart-uploads/{upload_id}/parts` - List
/// the upload's parts.
pub async fn list_parts(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((bucket, upload_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let listing = state.multipart.list_parts(&bucket, &upload_id).map_err(|e| ctx.failure(e))?;

    let parts: Vec<_> = listing
        .parts
        .into_iter()
        .map(|p| json!({ "part_number": p.part_number, "size": p.size_bytes, "etag": p.etag }))
        .collect();
    Ok(Json(json!({
        "upload_id": listing.upload_id,
        "object": listing.object,
        "state": listing.state.as_str(),
        "parts": parts,
    })))
}

/// `POST /v1/buckets/{bucket}/multipart-uploads/{upload_id}/complete` -
/// Assemble the requested parts into the final object.
pub async fn complete_upload(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((bucket, upload_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: CompleteRequest = serde_json::from_slice(&body)
        .map_err(|e| ctx.error(ErrorCode::InvalidJson, e.to_string()))?;
    let parts = validate_complete_parts(&ctx, request)?;

    let completed =
        state.multipart.complete(&bucket, &upload_id, &parts).await.map_err(|e| ctx.failure(e))?;

    Ok(Json(json!({
        "name": completed.name,
        "etag": completed.etag,
        "size": completed.size_bytes,
    })))
}

/// Structural validation of a complete request: parts non-empty, part
/// numbers positive and strictly increasing, etags non-empty.
///
/// Part-number violations report `INVALID_PART_NUMBER`; `INVALID_JSON` is
/// reserved for malformed bodies and empty etags.
fn validate_complete_parts(
    ctx: &RequestContext,
    request: CompleteRequest,
) -> Result<Vec<CompletePart>, ApiError> {
    if request.parts.is_empty() {
        return Err(ctx.error(ErrorCode::InvalidJson, "parts list is required"));
    }

    let mut parts = Vec::with_capacity(request.parts.len());
    let mut previous = 0i64;
    for part in request.parts {
        if part.part_number <= 0 {
            return Err(ctx.error(
                ErrorCode::InvalidPartNumber,
                "part_number must be a positive integer",
            ));
        }
        if part.etag.is_empty() {
            return Err(ctx.error(ErrorCode::InvalidJson, "etag is required for every part"));
        }
        if part.part_number <= previous {
            return Err(ctx.error(
                ErrorCode::InvalidPartNumber,
                "parts must be strictly increasing",
            ));
        }
        previous = part.part_number;
        parts.push(CompletePart { part_number: part.part_number as u32, etag: part.etag });
    }
    Ok(parts)
}

/// `DELETE /v1/buckets/{bucket}/multipart-uploads/{upload_id}` - Abort an
/// upload.
pub async fn abort_upload(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((bucket, upload_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.multipart.abort(&bucket, &upload_id).await.map_err(|e| ctx.failure(e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new()
    }

    fn request(parts: Vec<(i64, &str)>) -> CompleteRequest {
        CompleteRequest {
            parts: parts
                .into_iter()
                .map(|(part_number, etag)| CompleteRequestPart {
                    part_number,
                    etag: etag.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_validate_complete_parts_ok() {
        let parts =
            validate_complete_parts(&ctx(), request(vec![(1, "aa"), (2, "bb"), (7, "cc")]))
                .unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].part_number, 7);
    }

    #[test]
    fn test_validate_complete_parts_rejects_empty() {
        let err = validate_complete_parts(&ctx(), request(vec![])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidJson);
    }

    #[test]
    fn test_validate_complete_parts_rejects_unordered() {
        let err =
            validate_complete_parts(&ctx(), request(vec![(2, "aa"), (1, "bb")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPartNumber);

        let err =
            validate_complete_parts(&ctx(), request(vec![(1, "aa"), (1, "bb")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPartNumber);
    }

    #[test]
    fn test_validate_complete_parts_rejects_bad_entries() {
        let err = validate_complete_parts(&ctx(), request(vec![(0, "aa")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPartNumber);

        let err = validate_complete_parts(&ctx(), request(vec![(1, "")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidJson);
    }
}
