#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(warnings)]
// Allow some overly strict pedantic lints for async provider code
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]

//! Menu Upload Service
//!
//! The pluggable file storage core of the restaurant menu platform:
//! menu item images are uploaded through a primary/fallback pair of
//! storage providers (local disk, S3, Appwrite) with validation,
//! retry-with-backoff, per-operation failover and batch operations.

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

// Re-export the surface the rest of the application consumes
pub use application::{get_upload_service, reset_upload_service, UploadService};
pub use domain::{
    DeleteResult, ErrorCode, FileMetadata, ProviderType, UploadError, UploadFile, UploadedFile,
};
pub use infrastructure::config::{ConfigPatch, UploadPolicy, UploadServiceConfig};
