//! Background reaper for expired multipart uploads.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use nebulafs_core::config::CleanupConfig;
use nebulafs_core::error::Result;
use nebulafs_core::types::MultipartUpload;
use nebulafs_core::{rfc3339_after_seconds, UploadState};

use crate::blob::BlobStore;
use crate::metadata::SqliteMetadataStore;

/// Periodic task reclaiming multipart uploads past `expires_at` plus the
/// grace period: metadata rows and the upload's staging directory.
///
/// Every step tolerates already-removed rows and files, so a sweep
/// interrupted by a crash is simply finished by the next one.
pub struct ExpirySweeper {
    metadata: Arc<SqliteMetadataStore>,
    blob: Arc<BlobStore>,
    config: CleanupConfig,
}

impl ExpirySweeper {
    /// Create a sweeper over the given stores.
    #[must_use]
    pub fn new(
        metadata: Arc<SqliteMetadataStore>,
        blob: Arc<BlobStore>,
        config: CleanupConfig,
    ) -> Self {
        Self { metadata, blob, config }
    }

    /// Run the sweep loop forever. A failed sweep is logged and the loop
    /// continues with the next tick.
    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(self.config.sweep_interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; consume it
        // so sweeps start one full interval after startup.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(0) => {}
                Ok(reaped) => tracing::info!(reaped, "expired multipart uploads reaped"),
                Err(e) => tracing::warn!(error = %e, "multipart cleanup sweep failed"),
            }
        }
    }

    /// Perform one sweep, returning how many uploads were reaped.
    ///
    /// # Errors
    ///
    /// Returns an error only when the expired-upload scan itself fails;
    /// per-upload failures are logged and skipped.
    pub async fn sweep_once(&self) -> Result<usize> {
        let cutoff = rfc3339_after_seconds(-self.config.grace_period_seconds);
        let expired = self
            .metadata
            .list_expired_multipart_uploads(&cutoff, self.config.max_uploads_per_sweep)?;

        let mut reaped = 0;
        for upload in expired {
            match self.reap(&upload).await {
                Ok(()) => reaped += 1,
                Err(e) => {
                    tracing::warn!(upload_id = %upload.upload_id, error = %e,
                        "failed to reap expired upload");
                }
            }
        }
        Ok(reaped)
    }

    async fn reap(&self, upload: &MultipartUpload) -> Result<()> {
        self.metadata.update_multipart_upload_state(&upload.upload_id, UploadState::Expired)?;
        self.metadata.delete_multipart_parts(&upload.upload_id)?;
        self.metadata.delete_multipart_upload(&upload.upload_id)?;
        self.blob.remove_multipart_dir(&upload.upload_id).await;
        Ok(())
    }
}
