//! Core types and utilities for the NebulaFS object store.
//!
//! This crate provides the building blocks shared by every NebulaFS
//! component:
//! - Configuration management
//! - Error types with stable API error codes
//! - Common data types (ETag, metadata records, upload states)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, ErrorCode, Result};
pub use types::{is_safe_name, now_rfc3339, rfc3339_after_seconds, ETag, UploadState};
