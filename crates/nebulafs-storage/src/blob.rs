//! Local filesystem blob storage with atomic publish.
//!
//! Blobs live at `<base>/buckets/<bucket>/objects/<object>`. Writes stream
//! into a uniquely-named staging file under the temp root while a rolling
//! SHA-256 is updated, then rename into place so readers only ever observe
//! the previous bytes or the complete new bytes.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use nebulafs_core::error::{Error, ErrorCode, Result};
use nebulafs_core::{is_safe_name, ETag};

/// A published blob: its final path and what was written.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Final path of the blob on disk.
    pub path: PathBuf,
    /// Number of bytes stored.
    pub size_bytes: u64,
    /// Hex SHA-256 digest of the stored bytes.
    pub etag: ETag,
}

/// Location of a published blob on disk.
#[derive(Debug, Clone)]
pub struct BlobLocation {
    /// Path of the blob.
    pub path: PathBuf,
    /// Current file length.
    pub size_bytes: u64,
}

/// Filesystem blob sink keyed by `(bucket, object)`.
pub struct BlobStore {
    base_path: PathBuf,
    temp_path: PathBuf,
}

impl BlobStore {
    /// Create a blob store rooted at `base_path` with staging under
    /// `temp_path`, creating both directories and removing staging files
    /// orphaned by a previous run.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub async fn new(base_path: PathBuf, temp_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(&temp_path).await?;

        let store = Self { base_path, temp_path };
        store.recover_temp_files().await?;
        Ok(store)
    }

    /// Root directory for published blobs.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Staging root for in-flight writes.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Final path of an object blob.
    #[must_use]
    pub fn object_path(&self, bucket: &str, object: &str) -> PathBuf {
        self.base_path.join("buckets").join(bucket).join("objects").join(object)
    }

    /// Staging directory of a multipart upload.
    #[must_use]
    pub fn multipart_dir(&self, upload_id: &str) -> PathBuf {
        self.temp_path.join("multipart").join(upload_id)
    }

    /// Staging file of one uploaded part.
    #[must_use]
    pub fn part_path(&self, upload_id: &str, part_number: u32) -> PathBuf {
        self.multipart_dir(upload_id).join(format!("part-{part_number}"))
    }

    /// Remove staging files orphaned by a previous run. Only top-level
    /// regular files are touched; the multipart subtree belongs to the
    /// expiry sweeper.
    async fn recover_temp_files(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.temp_path).await?;
        let mut cleaned = 0u64;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                if let Err(e) = fs::remove_file(&path).await {
                    tracing::warn!(?path, error = %e, "failed to remove orphaned temp file");
                } else {
                    cleaned += 1;
                }
            }
        }

        if cleaned > 0 {
            tracing::info!(count = cleaned, "cleaned up orphaned temp files");
        }
        Ok(())
    }

    /// Create the bucket's object directory. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_NAME` for unsafe bucket names, or an I/O error.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        if !is_safe_name(bucket) {
            return Err(Error::api(ErrorCode::InvalidName, "invalid bucket name"));
        }
        fs::create_dir_all(self.base_path.join("buckets").join(bucket).join("objects")).await?;
        Ok(())
    }

    /// Stream `body` into the object blob and publish it atomically.
    ///
    /// Bytes flow chunk-by-chunk into a staging file while a rolling SHA-256
    /// is updated; the staging file is flushed and fsynced before the rename
    /// so a published path never holds partial bytes. A `max_bytes` of zero
    /// disables the size cap.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_NAME` for unsafe names, `PAYLOAD_TOO_LARGE` when the
    /// cap is exceeded, or an I/O error (the staging file is removed).
    pub async fn write_object<S, E>(
        &self,
        bucket: &str,
        object: &str,
        body: S,
        max_bytes: u64,
    ) -> Result<StoredBlob>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        if !is_safe_name(bucket) || !is_safe_name(object) {
            return Err(Error::api(ErrorCode::InvalidName, "invalid object path"));
        }
        self.ensure_bucket(bucket).await?;

        let temp_path = self.temp_path.join(Uuid::new_v4().to_string());
        let written = stream_to_file(&temp_path, body, max_bytes).await;
        let (size_bytes, etag) = match written {
            Ok(result) => result,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        let final_path = self.object_path(bucket, object);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&temp_path, &final_path).await?;

        Ok(StoredBlob { path: final_path, size_bytes, etag })
    }

    /// Stream `body` into a multipart part staging file.
    ///
    /// Parts are not published, so the write is flushed but not fsynced; the
    /// durability barrier happens once, when the completed object is
    /// assembled and renamed.
    ///
    /// # Errors
    ///
    /// Returns `PAYLOAD_TOO_LARGE` when the cap is exceeded, or an I/O
    /// error (the part file is removed).
    pub async fn write_part<S, E>(
        &self,
        upload_id: &str,
        part_number: u32,
        body: S,
        max_bytes: u64,
    ) -> Result<StoredBlob>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let part_path = self.part_path(upload_id, part_number);
        if let Some(parent) = part_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        match stream_to_file(&part_path, body, max_bytes).await {
            Ok((size_bytes, etag)) => Ok(StoredBlob { path: part_path, size_bytes, etag }),
            Err(e) => {
                let _ = fs::remove_file(&part_path).await;
                Err(e)
            }
        }
    }

    /// Locate a published blob.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_NAME` for unsafe names or `OBJECT_NOT_FOUND` when
    /// no blob exists at the object path.
    pub async fn read_object(&self, bucket: &str, object: &str) -> Result<BlobLocation> {
        if !is_safe_name(bucket) || !is_safe_name(object) {
            return Err(Error::api(ErrorCode::InvalidName, "invalid object path"));
        }
        let path = self.object_path(bucket, object);
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::api(ErrorCode::ObjectNotFound, "object not found"));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(BlobLocation { path, size_bytes: meta.len() })
    }

    /// Delete a published blob.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_NAME` for unsafe names or `OBJECT_NOT_FOUND` when
    /// no blob exists at the object path.
    pub async fn delete_object(&self, bucket: &str, object: &str) -> Result<()> {
        if !is_safe_name(bucket) || !is_safe_name(object) {
            return Err(Error::api(ErrorCode::InvalidName, "invalid object path"));
        }
        let path = self.object_path(bucket, object);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::api(ErrorCode::ObjectNotFound, "object not found"))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Remove a multipart upload's staging directory. Best-effort: missing
    /// directories and racing removals are ignored.
    pub async fn remove_multipart_dir(&self, upload_id: &str) {
        let dir = self.multipart_dir(upload_id);
        if let Err(e) = fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(?dir, error = %e, "failed to remove multipart temp dir");
            }
        }
    }
}

/// Drain a chunk stream into `path`, returning the byte count and SHA-256.
///
/// The file is flushed and fsynced before returning so a subsequent rename
/// publishes durable bytes.
async fn stream_to_file<S, E>(path: &Path, mut body: S, max_bytes: u64) -> Result<(u64, ETag)>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut file = fs::File::create(path).await?;
    let mut hasher = Sha256::new();
    let mut total: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            Error::api(ErrorCode::IoError, format!("failed to read request body: {e}"))
        })?;
        total += chunk.len() as u64;
        if max_bytes > 0 && total > max_bytes {
            return Err(Error::api(ErrorCode::PayloadTooLarge, "request body too large"));
        }
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    file.sync_all().await?;

    Ok((total, ETag::from_sha256(&hasher.finalize())))
}
