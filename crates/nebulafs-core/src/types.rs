//! Common types used throughout NebulaFS.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// An object or part ETag: the lowercase hex SHA-256 digest of the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ETag(String);

impl ETag {
    /// Creates an ETag from an already-hex-encoded digest string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Creates an ETag from a raw SHA-256 digest.
    #[must_use]
    pub fn from_sha256(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Returns the ETag value as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ETag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ETag {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A bucket row from the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    /// Surrogate row id.
    pub id: i64,
    /// Globally unique, path-safe bucket name.
    pub name: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// An object row from the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Surrogate row id.
    pub id: i64,
    /// Owning bucket row id.
    pub bucket_id: i64,
    /// Object name, unique within the bucket.
    pub name: String,
    /// Size of the stored bytes.
    pub size_bytes: u64,
    /// Hex SHA-256 digest of the stored bytes.
    pub etag: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
}

/// Lifecycle state of a multipart upload.
///
/// Transitions:
/// `initiated` -> `uploading` on the first part upsert;
/// `initiated | uploading` -> `completed` / `aborted` / `expired`.
/// The three terminal states are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    /// Created, no parts received yet.
    Initiated,
    /// At least one part has been uploaded.
    Uploading,
    /// Finalized into an object.
    Completed,
    /// Explicitly aborted by the client.
    Aborted,
    /// Reaped by the expiry sweeper.
    Expired,
}

impl UploadState {
    /// Returns the state name stored in the metadata store.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Expired => "expired",
        }
    }

    /// Whether this state is a sink: no further writes are accepted.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Expired)
    }
}

impl std::str::FromStr for UploadState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "uploading" => Ok(Self::Uploading),
            "completed" => Ok(Self::Completed),
            "aborted" => Ok(Self::Aborted),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown upload state: {other}")),
        }
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A multipart upload row from the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartUpload {
    /// Surrogate row id.
    pub id: i64,
    /// Globally unique opaque upload id.
    pub upload_id: String,
    /// Owning bucket row id.
    pub bucket_id: i64,
    /// Target object name.
    pub object_name: String,
    /// Current lifecycle state.
    pub state: UploadState,
    /// Expiry deadline (RFC 3339), derived at initiation.
    pub expires_at: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
}

/// A single uploaded part of a multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartPart {
    /// Surrogate row id.
    pub id: i64,
    /// Owning upload id.
    pub upload_id: String,
    /// Part number, unique within the upload.
    pub part_number: u32,
    /// Size of the part's bytes.
    pub size_bytes: u64,
    /// Hex SHA-256 digest of the part's bytes.
    pub etag: String,
    /// Staging file holding the part's bytes.
    pub temp_path: String,
    /// Upload timestamp (RFC 3339).
    pub created_at: String,
}

/// Whether a name is safe to use as a single path segment.
///
/// Safe names are non-empty, at most 255 bytes, consist solely of
/// `[A-Za-z0-9._-]`, and are neither `.` nor `..`.
#[must_use]
pub fn is_safe_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 255 {
        return false;
    }
    if name == "." || name == ".." {
        return false;
    }
    name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
///
/// The fixed-width format keeps lexicographic ordering consistent with
/// chronological ordering, which the expiry scan relies on.
#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// UTC time offset by `seconds` as an RFC 3339 string.
#[must_use]
pub fn rfc3339_after_seconds(seconds: i64) -> String {
    (Utc::now() + chrono::Duration::seconds(seconds))
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
