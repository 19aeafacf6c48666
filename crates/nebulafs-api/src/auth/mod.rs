//! Bearer-token authorization: middleware, token verification, JWKS cache.

pub mod jwks;
pub mod verifier;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use nebulafs_core::error::ErrorCode;

pub use jwks::JwksCache;
pub use verifier::{JwtClaims, JwtVerifier};

use crate::middleware::RequestContext;

/// Shared state for the auth middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token verifier shared across requests.
    pub verifier: Arc<JwtVerifier>,
}

/// Health endpoints stay public for liveness probes.
fn is_public_path(path: &str) -> bool {
    path == "/healthz" || path == "/readyz"
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme match is case-insensitive and surrounding whitespace is
/// trimmed. Returns `None` for a missing header, a non-bearer scheme, or an
/// empty token.
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    if value.len() < 7 || !value[..7].eq_ignore_ascii_case("bearer ") {
        return None;
    }
    let token = value[7..].trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Authorization middleware.
///
/// Runs before any body is read: unauthorized requests are rejected at the
/// header stage and their bodies are never consumed. Verified claims are
/// inserted into request extensions for handlers.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.verifier.enabled() || is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let ctx = request.extensions().get::<RequestContext>().cloned().unwrap_or_default();

    let Some(token) = extract_bearer_token(request.headers()) else {
        return ctx.error(ErrorCode::Unauthorized, "missing bearer token").into_response();
    };

    match state.verifier.verify(&token).await {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => ctx.failure(e).into_response(),
    }
}
