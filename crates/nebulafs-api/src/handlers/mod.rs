//! HTTP request handlers.

pub mod bucket;
pub mod health;
pub mod multipart;
pub mod object;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use nebulafs_core::Config;
use nebulafs_storage::{BlobStore, MultipartCoordinator, SqliteMetadataStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Metadata index.
    pub metadata: Arc<SqliteMetadataStore>,
    /// Blob storage.
    pub blob: Arc<BlobStore>,
    /// Multipart upload coordinator.
    pub multipart: Arc<MultipartCoordinator>,
    /// Server configuration.
    pub config: Arc<Config>,
    /// Prometheus exposition handle; absent when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// The configured request body cap (zero means unlimited).
    #[must_use]
    pub fn max_body_bytes(&self) -> u64 {
        self.config.server.limits.max_body_bytes
    }
}
