//! Object operation handlers: streaming upload, ranged download, listing.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use nebulafs_core::error::ErrorCode;
use nebulafs_core::is_safe_name;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::RequestContext;

/// Query parameters for object listing.
#[derive(Debug, Deserialize, Default)]
pub struct ListObjectsQuery {
    /// Name prefix filter.
    pub prefix: Option<String>,
}

/// Query parameters for the query-name upload variant.
#[derive(Debug, Deserialize, Default)]
pub struct PutObjectQuery {
    /// Object name.
    pub name: Option<String>,
}

/// A single satisfiable byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ByteRange {
    start: u64,
    end: u64,
}

/// Parse a single `bytes=<start>-[<end>]` range spec against an object of
/// `size` bytes. Multi-range is unsupported.
fn parse_range(header: &str, size: u64) -> Option<ByteRange> {
    let spec = header.strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;
    if start_str.is_empty() {
        return None;
    }

    let start: u64 = start_str.parse().ok()?;
    let end: u64 = if end_str.is_empty() { size.checked_sub(1)? } else { end_str.parse().ok()? };

    if start > end || end >= size {
        return None;
    }
    Some(ByteRange { start, end })
}

/// `GET /v1/buckets/{bucket}/objects` - List objects, optionally by prefix.
pub async fn list_objects(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(bucket): Path<String>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let prefix = query.prefix.unwrap_or_default();
    let objects = state.metadata.list_objects(&bucket, &prefix).map_err(|e| ctx.failure(e))?;

    let entries: Vec<_> = objects
        .into_iter()
        .map(|o| {
            json!({
                "name": o.name,
                "size": o.size_bytes,
                "etag": o.etag,
                "updated_at": o.updated_at,
            })
        })
        .collect();
    Ok(Json(json!({ "objects": entries })))
}

/// `PUT /v1/buckets/{bucket}/objects/{object}` - Streaming upload.
pub async fn put_object(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((bucket, object)): Path<(String, String)>,
    body: Body,
) -> Result<Json<serde_json::Value>, ApiError> {
    store_object(&state, &ctx, &bucket, &object, body).await
}

/// `POST /v1/buckets/{bucket}/objects?name={object}` - Upload with the
/// object name in the query string.
pub async fn put_object_query(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(bucket): Path<String>,
    Query(query): Query<PutObjectQuery>,
    body: Body,
) -> Result<Json<serde_json::Value>, ApiError> {
    let object = match query.name {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ctx.error(ErrorCode::MissingName, "missing object name")),
    };
    store_object(&state, &ctx, &bucket, &object, body).await
}

/// Shared upload path: the body streams chunk-by-chunk into the blob store
/// (never fully buffered) and metadata is upserted with the computed digest.
async fn store_object(
    state: &AppState,
    ctx: &RequestContext,
    bucket: &str,
    object: &str,
    body: Body,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !is_safe_name(bucket) || !is_safe_name(object) {
        return Err(ctx.error(ErrorCode::InvalidName, "invalid bucket/object"));
    }
    state.metadata.get_bucket(bucket).map_err(|e| ctx.failure(e))?;

    let stored = state
        .blob
        .write_object(bucket, object, body.into_data_stream(), state.max_body_bytes())
        .await
        .map_err(|e| ctx.failure(e))?;

    let record = state
        .metadata
        .upsert_object(bucket, object, stored.size_bytes, stored.etag.as_str())
        .map_err(|e| ctx.failure(e))?;

    Ok(Json(json!({ "etag": record.etag, "size": record.size_bytes })))
}

/// `GET /v1/buckets/{bucket}/objects/{object}` - Streaming download with
/// single-range support.
pub async fn get_object(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((bucket, object)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let blob = state.blob.read_object(&bucket, &object).await.map_err(|e| ctx.failure(e))?;

    let mut file = tokio::fs::File::open(&blob.path)
        .await
        .map_err(|_| ctx.error(ErrorCode::IoError, "failed to open object"))?;
    let size = blob.size_bytes;

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let Some(range_header) = range_header else {
        let stream = ReaderStream::new(file);
        return Ok(binary_response(StatusCode::OK, size, None, Body::from_stream(stream)));
    };

    match parse_range(range_header, size) {
        Some(range) => {
            file.seek(std::io::SeekFrom::Start(range.start))
                .await
                .map_err(|_| ctx.error(ErrorCode::IoError, "failed to seek object"))?;
            let length = range.end - range.start + 1;
            let stream = ReaderStream::new(file.take(length));
            let content_range = format!("bytes {}-{}/{}", range.start, range.end, size);
            Ok(binary_response(
                StatusCode::PARTIAL_CONTENT,
                length,
                Some(content_range),
                Body::from_stream(stream),
            ))
        }
        None => {
            let mut response = ctx.error(ErrorCode::InvalidRange, "invalid range").into_response();
            if let Ok(value) = format!("bytes */{size}").parse() {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            Ok(response)
        }
    }
}

fn binary_response(
    status: StatusCode,
    content_length: u64,
    content_range: Option<String>,
    body: Body,
) -> Response {
    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, content_length);
    if let Some(range) = content_range {
        response = response.header(header::CONTENT_RANGE, range);
    }
    response.body(body).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// `DELETE /v1/buckets/{bucket}/objects/{object}` - Delete an object.
pub async fn delete_object(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((bucket, object)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.blob.delete_object(&bucket, &object).await.map_err(|e| ctx.failure(e))?;
    state.metadata.delete_object(&bucket, &object).map_err(|e| ctx.failure(e))?;

    Ok(Json(json!({ "deleted": true })))
}
