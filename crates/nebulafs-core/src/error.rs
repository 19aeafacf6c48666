//! Error types for NebulaFS with stable API error codes.

use thiserror::Error;

/// A specialized `Result` type for NebulaFS operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error codes surfaced in the API error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A bucket or object name failed path-safety validation.
    InvalidName,
    /// A request body could not be parsed as the expected JSON document.
    InvalidJson,
    /// A part number was not a positive integer in range.
    InvalidPartNumber,
    /// A `Range` header did not describe a satisfiable byte range.
    InvalidRange,
    /// A required object name was missing from the request.
    MissingName,
    /// The request could not be authorized.
    Unauthorized,
    /// The requested route does not exist.
    NotFound,
    /// The specified bucket does not exist.
    BucketNotFound,
    /// The specified object does not exist.
    ObjectNotFound,
    /// The specified multipart upload does not exist.
    UploadNotFound,
    /// The resource already exists.
    AlreadyExists,
    /// The operation is not allowed in the upload's current state.
    InvalidState,
    /// A part's stored digest did not match the digest in the request.
    EtagMismatch,
    /// A requested part was never uploaded.
    MissingPart,
    /// The request body exceeded the configured size cap.
    PayloadTooLarge,
    /// A filesystem operation failed.
    IoError,
    /// A metadata store operation failed.
    DbError,
    /// An unclassified internal failure.
    Internal,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidName
            | Self::InvalidJson
            | Self::InvalidPartNumber
            | Self::MissingName => 400,
            Self::Unauthorized => 401,
            Self::NotFound
            | Self::BucketNotFound
            | Self::ObjectNotFound
            | Self::UploadNotFound => 404,
            Self::AlreadyExists | Self::InvalidState | Self::EtagMismatch | Self::MissingPart => {
                409
            }
            Self::PayloadTooLarge => 413,
            Self::InvalidRange => 416,
            Self::IoError | Self::DbError | Self::Internal => 500,
        }
    }

    /// Returns the envelope code string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidName => "INVALID_NAME",
            Self::InvalidJson => "INVALID_JSON",
            Self::InvalidPartNumber => "INVALID_PART_NUMBER",
            Self::InvalidRange => "INVALID_RANGE",
            Self::MissingName => "MISSING_NAME",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::BucketNotFound => "BUCKET_NOT_FOUND",
            Self::ObjectNotFound => "OBJECT_NOT_FOUND",
            Self::UploadNotFound => "UPLOAD_NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::InvalidState => "INVALID_STATE",
            Self::EtagMismatch => "ETAG_MISMATCH",
            Self::MissingPart => "MISSING_PART",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::IoError => "IO_ERROR",
            Self::DbError => "DB_ERROR",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during NebulaFS operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An API-visible error with a stable code.
    #[error("{code}: {message}")]
    Api {
        /// The envelope error code.
        code: ErrorCode,
        /// A short, stable, human-readable message.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata database error.
    #[error("database error: {0}")]
    Database(String),
}

impl Error {
    /// Creates a new API error.
    #[must_use]
    pub fn api(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api { code, message: message.into() }
    }

    /// Returns the envelope error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Api { code, .. } => *code,
            Self::Config(_) => ErrorCode::Internal,
            Self::Io(_) => ErrorCode::IoError,
            Self::Database(_) => ErrorCode::DbError,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code().http_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status() {
        assert_eq!(ErrorCode::InvalidName.http_status(), 400);
        assert_eq!(ErrorCode::Unauthorized.http_status(), 401);
        assert_eq!(ErrorCode::BucketNotFound.http_status(), 404);
        assert_eq!(ErrorCode::AlreadyExists.http_status(), 409);
        assert_eq!(ErrorCode::EtagMismatch.http_status(), 409);
        assert_eq!(ErrorCode::PayloadTooLarge.http_status(), 413);
        assert_eq!(ErrorCode::InvalidRange.http_status(), 416);
        assert_eq!(ErrorCode::DbError.http_status(), 500);
    }

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::EtagMismatch.as_str(), "ETAG_MISMATCH");
        assert_eq!(ErrorCode::UploadNotFound.to_string(), "UPLOAD_NOT_FOUND");
    }

    #[test]
    fn test_error_construction() {
        let err = Error::api(ErrorCode::MissingPart, "missing uploaded part 3");
        assert_eq!(err.code(), ErrorCode::MissingPart);
        assert_eq!(err.http_status(), 409);
        assert_eq!(err.to_string(), "MISSING_PART: missing uploaded part 3");

        let io = Error::from(std::io::Error::other("disk on fire"));
        assert_eq!(io.code(), ErrorCode::IoError);
        assert_eq!(io.http_status(), 500);
    }
}
