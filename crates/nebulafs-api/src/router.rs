//! API router configuration.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{middleware as axum_middleware, Extension, Router};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use nebulafs_core::error::ErrorCode;

use crate::auth::{auth_middleware, AuthState, JwtVerifier};
use crate::handlers::{bucket, health, multipart, object, AppState};
use crate::middleware::{request_context_layer, RequestContext};

/// Create the API router.
///
/// Middleware order (outermost first): body limit, HTTP tracing, request
/// context, auth. Auth therefore runs after a request id exists but before
/// any handler reads a body.
pub fn create_router(state: AppState) -> Router {
    let verifier = Arc::new(JwtVerifier::new(&state.config.auth));
    let auth_state = AuthState { verifier };
    let max_body_bytes = state.config.server.limits.max_body_bytes;

    let router = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/v1/buckets", post(bucket::create_bucket).get(bucket::list_buckets))
        .route(
            "/v1/buckets/{bucket}/objects",
            get(object::list_objects).post(object::put_object_query),
        )
        .route(
            "/v1/buckets/{bucket}/objects/{object}",
            put(object::put_object).get(object::get_object).delete(object::delete_object),
        )
        .route("/v1/buckets/{bucket}/multipart-uploads", post(multipart::initiate_upload))
        .route(
            "/v1/buckets/{bucket}/multipart-uploads/{upload_id}",
            delete(multipart::abort_upload),
        )
        .route(
            "/v1/buckets/{bucket}/multipart-uploads/{upload_id}/parts",
            get(multipart::list_parts),
        )
        .route(
            "/v1/buckets/{bucket}/multipart-uploads/{upload_id}/parts/{part_number}",
            put(multipart::upload_part),
        )
        .route(
            "/v1/buckets/{bucket}/multipart-uploads/{upload_id}/complete",
            post(multipart::complete_upload),
        )
        .fallback(not_found)
        .with_state(state);

    let router = router.layer(axum_middleware::from_fn_with_state(auth_state, auth_middleware));
    let router = router.layer(axum_middleware::from_fn(request_context_layer));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));
    let router = router.layer(trace_layer);

    if max_body_bytes > 0 {
        router.layer(DefaultBodyLimit::max(max_body_bytes as usize))
    } else {
        router.layer(DefaultBodyLimit::disable())
    }
}

/// Unmatched routes get the standard error envelope.
async fn not_found(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    ctx.error(ErrorCode::NotFound, "route not found")
}
