//! Pluggable storage backends for menu media uploads.
//!
//! Every backend implements the [`StorageProvider`] capability contract;
//! provider-specific extras (presigned URLs, batch deletes, maintenance
//! scans) live on the concrete types.

use async_trait::async_trait;

pub mod appwrite;
pub mod factory;
pub mod local;
pub mod s3;
pub mod utils;

pub use appwrite::AppwriteProvider;
pub use local::LocalProvider;
pub use s3::S3Provider;

use crate::domain::{
    DeleteResult, ErrorCode, FileMetadata, ProviderType, UploadError, UploadFile, UploadedFile,
};
use crate::infrastructure::config::UploadPolicy;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File size {size} bytes exceeds maximum of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("MIME type not allowed: {mime}")]
    InvalidMimeType { mime: String },

    #[error("File extension not allowed: {extension}")]
    InvalidExtension { extension: String },

    #[error("File is empty")]
    EmptyFile,

    #[error("Payload rejected as too large: {message}")]
    PayloadTooLarge { message: String },

    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Invalid request signature: {message}")]
    InvalidSignature { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("File already exists: {key}")]
    FileExists { key: String },

    #[error("Directory error: {message}")]
    DirectoryError { message: String },

    #[error("Upload failed: {message}")]
    UploadFailed { message: String },

    #[error("Delete failed: {message}")]
    DeleteFailed { message: String },

    #[error("URL generation failed: {message}")]
    UrlGenerationFailed { message: String },

    #[error("Presigned URL generation failed: {message}")]
    PresignedUrlFailed { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl StorageError {
    /// Taxonomy code surfaced to callers.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::FileTooLarge { .. } | Self::PayloadTooLarge { .. } => ErrorCode::FileTooLarge,
            Self::InvalidMimeType { .. } => ErrorCode::InvalidMimeType,
            Self::InvalidExtension { .. } => ErrorCode::InvalidExtension,
            Self::EmptyFile => ErrorCode::EmptyFile,
            Self::BucketNotFound { .. } => ErrorCode::BucketNotFound,
            Self::AccessDenied { .. } => ErrorCode::AccessDenied,
            Self::InvalidCredentials { .. } => ErrorCode::InvalidCredentials,
            Self::InvalidSignature { .. } => ErrorCode::InvalidSignature,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::FileExists { .. } => ErrorCode::FileExists,
            Self::DirectoryError { .. } => ErrorCode::DirectoryError,
            Self::UploadFailed { .. } | Self::Io { .. } => ErrorCode::UploadFailed,
            Self::DeleteFailed { .. } => ErrorCode::DeleteFailed,
            Self::UrlGenerationFailed { .. } => ErrorCode::UrlGenerationFailed,
            Self::PresignedUrlFailed { .. } => ErrorCode::PresignedUrlFailed,
        }
    }

    /// Attach the provider tag, producing the structured result shape.
    #[must_use]
    pub fn into_upload_error(self, provider: ProviderType) -> UploadError {
        UploadError::new(provider, self.code(), self.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::Io { message: error.to_string() }
    }
}

/// Capability contract every storage backend implements.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Registry tag for this backend.
    fn provider_type(&self) -> ProviderType;

    /// Validate and store a file, returning the stored location.
    ///
    /// Expected failures (validation, transport) come back as `Err`;
    /// transport calls are retried internally before being reported.
    async fn upload(
        &self,
        file: &UploadFile,
        policy: &UploadPolicy,
    ) -> Result<UploadedFile, UploadError>;

    /// Delete a stored file. Existence is confirmed first: an absent key
    /// resolves to `{success: false, error: "File not found"}` without
    /// contacting the delete transport.
    async fn delete(&self, key: &str) -> DeleteResult;

    /// Public or signed URL for a stored key. May perform a network round
    /// trip; callers must not assume it is cheap.
    async fn url(&self, key: &str) -> Result<String, StorageError>;

    /// Best-effort existence probe. Ambiguous remote statuses degrade to
    /// `Ok(false)`; only genuine transport failure is an error (consumed
    /// by health checks, flattened to `false` by the service).
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Metadata for a stored key, `None` on any retrieval failure.
    async fn metadata(&self, key: &str) -> Option<FileMetadata>;
}
