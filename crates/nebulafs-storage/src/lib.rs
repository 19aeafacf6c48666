//! Storage backend for the NebulaFS object store.
//!
//! This crate provides:
//! - SQLite-backed metadata storage
//! - Local filesystem storage for object blobs with atomic publish
//! - The multipart upload coordinator and its expiry sweeper

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod blob;
pub mod metadata;
pub mod multipart;
pub mod sweeper;

pub use blob::{BlobLocation, BlobStore, StoredBlob};
pub use metadata::SqliteMetadataStore;
pub use multipart::MultipartCoordinator;
pub use sweeper::ExpirySweeper;
