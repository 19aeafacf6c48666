//! Multipart upload coordinator.
//!
//! The coordinator is the only component that transitions upload state. It
//! orders metadata and blob operations so that a crash at any point leaves
//! either reclaimable staging files (the sweeper's job) or a fully published
//! object, never a partial object at the final path.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use nebulafs_core::error::{Error, ErrorCode, Result};
use nebulafs_core::types::{MultipartPart, MultipartUpload};
use nebulafs_core::{is_safe_name, rfc3339_after_seconds, ETag, UploadState};

use crate::blob::BlobStore;
use crate::metadata::SqliteMetadataStore;

/// Part numbers above this are rejected outright.
const MAX_PART_NUMBER: u32 = 10_000;

/// Buffer size for part assembly.
const ASSEMBLY_BUF_SIZE: usize = 8 * 1024;

/// Result of initiating an upload.
#[derive(Debug, Clone)]
pub struct InitiatedUpload {
    /// Fresh opaque upload id.
    pub upload_id: String,
    /// Target object name.
    pub object: String,
    /// Expiry deadline (RFC 3339).
    pub expires_at: String,
}

/// Result of storing one part.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    /// Owning upload id.
    pub upload_id: String,
    /// Part number as supplied by the client.
    pub part_number: u32,
    /// Hex SHA-256 of the part bytes.
    pub etag: String,
    /// Part size in bytes.
    pub size_bytes: u64,
}

/// Snapshot of an upload and its parts.
#[derive(Debug, Clone)]
pub struct PartListing {
    /// Owning upload id.
    pub upload_id: String,
    /// Target object name.
    pub object: String,
    /// Current upload state.
    pub state: UploadState,
    /// Parts ordered by part number ascending.
    pub parts: Vec<MultipartPart>,
}

/// A `{part_number, etag}` pair from a complete request.
#[derive(Debug, Clone)]
pub struct CompletePart {
    /// Part number the client expects to include.
    pub part_number: u32,
    /// Digest the client expects that part to have.
    pub etag: String,
}

/// Result of completing an upload.
#[derive(Debug, Clone)]
pub struct CompletedObject {
    /// Published object name.
    pub name: String,
    /// Hex SHA-256 of the assembled bytes.
    pub etag: String,
    /// Total size of the assembled bytes.
    pub size_bytes: u64,
}

/// Orchestrates initiate / upload-part / list / complete / abort across the
/// metadata store and the blob store.
pub struct MultipartCoordinator {
    metadata: Arc<SqliteMetadataStore>,
    blob: Arc<BlobStore>,
    upload_ttl_seconds: i64,
}

impl MultipartCoordinator {
    /// Create a coordinator with the given upload lifetime.
    #[must_use]
    pub fn new(
        metadata: Arc<SqliteMetadataStore>,
        blob: Arc<BlobStore>,
        upload_ttl_seconds: i64,
    ) -> Self {
        Self { metadata, blob, upload_ttl_seconds }
    }

    /// Begin a new upload for `object` in `bucket`.
    ///
    /// # Errors
    ///
    /// Returns `BUCKET_NOT_FOUND` when the bucket is absent and
    /// `INVALID_NAME` for unsafe object names.
    pub fn initiate(&self, bucket: &str, object: &str) -> Result<InitiatedUpload> {
        self.metadata.get_bucket(bucket)?;
        if !is_safe_name(object) {
            return Err(Error::api(ErrorCode::InvalidName, "invalid object name"));
        }

        let upload_id = Uuid::new_v4().to_string();
        let expires_at = rfc3339_after_seconds(self.upload_ttl_seconds);
        let upload =
            self.metadata.create_multipart_upload(bucket, &upload_id, object, &expires_at)?;

        Ok(InitiatedUpload {
            upload_id: upload.upload_id,
            object: upload.object_name,
            expires_at: upload.expires_at,
        })
    }

    /// Store one part of an upload, replacing any prior part with the same
    /// number, and move the upload into `uploading`.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_PART_NUMBER` for out-of-range numbers,
    /// `UPLOAD_NOT_FOUND` when the upload is not bound to `bucket`, and
    /// `INVALID_STATE` when the upload is terminal.
    pub async fn upload_part<S, E>(
        &self,
        bucket: &str,
        upload_id: &str,
        part_number: u32,
        body: S,
        max_bytes: u64,
    ) -> Result<UploadedPart>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        if part_number == 0 || part_number > MAX_PART_NUMBER {
            return Err(Error::api(
                ErrorCode::InvalidPartNumber,
                format!("part_number must be between 1 and {MAX_PART_NUMBER}"),
            ));
        }

        let upload = self.upload_for_bucket(bucket, upload_id)?;
        if upload.state.is_terminal() {
            return Err(Error::api(ErrorCode::InvalidState, "upload is not writable"));
        }

        let stored = self.blob.write_part(upload_id, part_number, body, max_bytes).await?;
        let part = self.metadata.upsert_multipart_part(
            upload_id,
            part_number,
            stored.size_bytes,
            stored.etag.as_str(),
            &stored.path.to_string_lossy(),
        )?;
        self.metadata.update_multipart_upload_state(upload_id, UploadState::Uploading)?;

        Ok(UploadedPart {
            upload_id: upload_id.to_string(),
            part_number,
            etag: part.etag,
            size_bytes: part.size_bytes,
        })
    }

    /// Snapshot an upload's state and parts.
    ///
    /// # Errors
    ///
    /// Returns `UPLOAD_NOT_FOUND` when the upload is not bound to `bucket`.
    pub fn list_parts(&self, bucket: &str, upload_id: &str) -> Result<PartListing> {
        let upload = self.upload_for_bucket(bucket, upload_id)?;
        let parts = self.metadata.list_multipart_parts(upload_id)?;
        Ok(PartListing {
            upload_id: upload.upload_id,
            object: upload.object_name,
            state: upload.state,
            parts,
        })
    }

    /// Assemble the requested parts into the final object and finalize the
    /// upload.
    ///
    /// `parts` must already be structurally valid (non-empty, strictly
    /// increasing part numbers, non-empty etags); this method enforces the
    /// stateful contracts: every requested part exists (`MISSING_PART`) and
    /// carries the expected digest (`ETAG_MISMATCH`).
    ///
    /// # Errors
    ///
    /// Returns `UPLOAD_NOT_FOUND`, `INVALID_STATE`, `MISSING_PART`,
    /// `ETAG_MISMATCH`, or an I/O error.
    pub async fn complete(
        &self,
        bucket: &str,
        upload_id: &str,
        parts: &[CompletePart],
    ) -> Result<CompletedObject> {
        let upload = self.upload_for_bucket(bucket, upload_id)?;
        if upload.state.is_terminal() {
            return Err(Error::api(ErrorCode::InvalidState, "upload is not completable"));
        }

        let stored_parts = self.metadata.list_multipart_parts(upload_id)?;
        if stored_parts.is_empty() {
            return Err(Error::api(ErrorCode::InvalidState, "no parts uploaded"));
        }
        let part_map: HashMap<u32, &MultipartPart> =
            stored_parts.iter().map(|p| (p.part_number, p)).collect();

        let upload_dir = self.blob.multipart_dir(upload_id);
        let assembly_path = upload_dir.join(format!("complete-{}", Uuid::new_v4()));
        let mut out = fs::File::create(&assembly_path).await?;

        let mut hasher = Sha256::new();
        let mut total: u64 = 0;
        let mut buf = vec![0u8; ASSEMBLY_BUF_SIZE];

        for expected in parts {
            let part = match part_map.get(&expected.part_number) {
                Some(part) => *part,
                None => {
                    let _ = fs::remove_file(&assembly_path).await;
                    return Err(Error::api(
                        ErrorCode::MissingPart,
                        format!("missing uploaded part {}", expected.part_number),
                    ));
                }
            };
            if part.etag != expected.etag {
                let _ = fs::remove_file(&assembly_path).await;
                return Err(Error::api(
                    ErrorCode::EtagMismatch,
                    format!("part etag mismatch for part {}", expected.part_number),
                ));
            }

            let mut input = match fs::File::open(&part.temp_path).await {
                Ok(file) => file,
                Err(e) => {
                    let _ = fs::remove_file(&assembly_path).await;
                    return Err(Error::api(
                        ErrorCode::IoError,
                        format!("failed to read uploaded part {}: {e}", part.part_number),
                    ));
                }
            };
            loop {
                let read = input.read(&mut buf).await?;
                if read == 0 {
                    break;
                }
                out.write_all(&buf[..read]).await?;
                hasher.update(&buf[..read]);
                total += read as u64;
            }
        }

        out.flush().await?;
        drop(out);

        let etag = ETag::from_sha256(&hasher.finalize());
        let final_path = self.blob.object_path(bucket, &upload.object_name);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&assembly_path, &final_path).await?;

        self.metadata.upsert_object(bucket, &upload.object_name, total, etag.as_str())?;

        self.metadata.update_multipart_upload_state(upload_id, UploadState::Completed)?;
        self.metadata.delete_multipart_parts(upload_id)?;
        self.metadata.delete_multipart_upload(upload_id)?;
        self.blob.remove_multipart_dir(upload_id).await;

        Ok(CompletedObject {
            name: upload.object_name,
            etag: etag.as_str().to_string(),
            size_bytes: total,
        })
    }

    /// Abort an upload, discarding its parts and staging directory.
    ///
    /// A completed upload cannot be aborted. Aborting an upload whose row is
    /// already gone (earlier abort, complete, or sweep) reports
    /// `UPLOAD_NOT_FOUND`.
    ///
    /// # Errors
    ///
    /// Returns `UPLOAD_NOT_FOUND` or `INVALID_STATE`.
    pub async fn abort(&self, bucket: &str, upload_id: &str) -> Result<()> {
        let upload = self.upload_for_bucket(bucket, upload_id)?;
        if upload.state == UploadState::Completed {
            return Err(Error::api(ErrorCode::InvalidState, "completed upload cannot abort"));
        }

        self.metadata.update_multipart_upload_state(upload_id, UploadState::Aborted)?;
        self.metadata.delete_multipart_parts(upload_id)?;
        self.metadata.delete_multipart_upload(upload_id)?;
        self.blob.remove_multipart_dir(upload_id).await;
        Ok(())
    }

    /// Resolve an upload and check it belongs to `bucket`.
    fn upload_for_bucket(&self, bucket: &str, upload_id: &str) -> Result<MultipartUpload> {
        let not_found =
            || Error::api(ErrorCode::UploadNotFound, "multipart upload not found for bucket");

        let bucket_row = match self.metadata.get_bucket(bucket) {
            Ok(row) => row,
            Err(e) if e.code() == ErrorCode::BucketNotFound => return Err(not_found()),
            Err(e) => return Err(e),
        };
        let upload = match self.metadata.get_multipart_upload(upload_id) {
            Ok(upload) => upload,
            Err(e) if e.code() == ErrorCode::UploadNotFound => return Err(not_found()),
            Err(e) => return Err(e),
        };
        if upload.bucket_id != bucket_row.id {
            return Err(not_found());
        }
        Ok(upload)
    }
}
