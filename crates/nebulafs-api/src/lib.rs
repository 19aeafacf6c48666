//! HTTP API layer for the NebulaFS object store.
//!
//! This crate provides:
//! - The versioned REST API handlers (buckets, objects, multipart uploads)
//! - Bearer-token authorization (JWT + JWKS key resolution)
//! - Request-context middleware and Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;

pub use error::ApiError;
pub use handlers::AppState;
pub use metrics::init_metrics;
pub use router::create_router;
