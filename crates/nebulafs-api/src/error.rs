//! API error type and the JSON error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use nebulafs_core::error::{Error as CoreError, ErrorCode};

/// API-level error rendered as the JSON error envelope
/// `{"error":{"code","message","request_id"}}`.
#[derive(Debug)]
pub struct ApiError {
    /// Envelope error code.
    pub code: ErrorCode,
    /// Short, stable message.
    pub message: String,
    /// Id of the request that produced the error.
    pub request_id: String,
}

impl ApiError {
    /// Create a new API error bound to a request id.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self { code, message: message.into(), request_id: request_id.into() }
    }

    /// Convert a core error, keeping its code and message.
    ///
    /// Raw database messages are never forwarded to clients.
    #[must_use]
    pub fn from_core(err: CoreError, request_id: impl Into<String>) -> Self {
        let message = match &err {
            CoreError::Api { message, .. } => message.clone(),
            CoreError::Io(_) => "storage I/O failure".to_string(),
            CoreError::Database(_) => "metadata store failure".to_string(),
            CoreError::Config(_) => "internal configuration failure".to_string(),
        };
        Self { code: err.code(), message, request_id: request_id.into() }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "request_id": self.request_id,
            }
        });

        (self.status_code(), axum::Json(body)).into_response()
    }
}
