use serde::{Deserialize, Serialize};

use super::provider::ProviderType;

/// Stable error code attached to every failed operation.
///
/// Codes are part of the public contract with the rest of the application
/// (API routes translate them into HTTP responses), so their string form
/// never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation — detected before any transport I/O, never retried.
    FileTooLarge,
    InvalidMimeType,
    InvalidExtension,
    EmptyFile,
    // Configuration — fatal at construction.
    InvalidConfig,
    UnknownProvider,
    ProviderInitializationFailed,
    // Transport / provider-specific.
    BucketNotFound,
    AccessDenied,
    InvalidCredentials,
    InvalidSignature,
    Unauthorized,
    FileExists,
    FileNotFound,
    DirectoryError,
    UploadFailed,
    DeleteFailed,
    // URL derivation.
    UrlGenerationFailed,
    PresignedUrlFailed,
    // Batch.
    BatchUploadFailed,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::InvalidMimeType => "INVALID_MIME_TYPE",
            Self::InvalidExtension => "INVALID_EXTENSION",
            Self::EmptyFile => "EMPTY_FILE",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::UnknownProvider => "UNKNOWN_PROVIDER",
            Self::ProviderInitializationFailed => "PROVIDER_INITIALIZATION_FAILED",
            Self::BucketNotFound => "BUCKET_NOT_FOUND",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::FileExists => "FILE_EXISTS",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::DirectoryError => "DIRECTORY_ERROR",
            Self::UploadFailed => "UPLOAD_FAILED",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::UrlGenerationFailed => "URL_GENERATION_FAILED",
            Self::PresignedUrlFailed => "PRESIGNED_URL_FAILED",
            Self::BatchUploadFailed => "BATCH_UPLOAD_FAILED",
        }
    }

    /// Whether the code describes a validation rejection attributable to
    /// caller input (never retried, never failed over).
    #[must_use]
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            Self::FileTooLarge | Self::InvalidMimeType | Self::InvalidExtension | Self::EmptyFile
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned (or logged) by provider and service
/// operations. Exactly one of `UploadedFile` / `UploadError` is produced
/// per operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message} (provider: {provider})")]
pub struct UploadError {
    pub provider: ProviderType,
    pub code: ErrorCode,
    pub message: String,
}

impl UploadError {
    #[must_use]
    pub fn new(provider: ProviderType, code: ErrorCode, message: impl Into<String>) -> Self {
        Self { provider, code, message: message.into() }
    }
}
