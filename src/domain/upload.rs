use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provider::ProviderType;

/// Inbound file payload, created by the caller per upload request and
/// consumed once. `key` lets the caller pin the storage key instead of
/// having one derived.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub data: Bytes,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub key: Option<String>,
}

impl UploadFile {
    #[must_use]
    pub fn new(
        data: impl Into<Bytes>,
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self { data, original_name: original_name.into(), mime_type: mime_type.into(), size, key: None }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Successful upload outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub url: String,
    pub key: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub provider: ProviderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileMetadata>,
}

/// Outcome of a delete operation. Always a resolved value, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    pub key: String,
    pub provider: ProviderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteResult {
    #[must_use]
    pub fn ok(provider: ProviderType, key: impl Into<String>) -> Self {
        Self { success: true, key: key.into(), provider, error: None }
    }

    /// The key was never stored; the delete transport is not contacted.
    #[must_use]
    pub fn not_found(provider: ProviderType, key: impl Into<String>) -> Self {
        Self { success: false, key: key.into(), provider, error: Some("File not found".to_string()) }
    }

    #[must_use]
    pub fn failed(provider: ProviderType, key: impl Into<String>, error: impl Into<String>) -> Self {
        Self { success: false, key: key.into(), provider, error: Some(error.into()) }
    }
}

/// Best-effort metadata about a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_file_derives_size() {
        let file = UploadFile::new(&b"hello"[..], "a.txt", "text/plain");
        assert_eq!(file.size, 5);
        assert_eq!(file.key, None);
    }

    #[test]
    fn test_upload_file_with_key() {
        let file = UploadFile::new(&b"x"[..], "a.png", "image/png").with_key("menus/a.png");
        assert_eq!(file.key.as_deref(), Some("menus/a.png"));
    }

    #[test]
    fn test_delete_result_not_found_message() {
        let result = DeleteResult::not_found(ProviderType::Local, "missing.png");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("File not found"));
    }

    #[test]
    fn test_delete_result_serialization_skips_empty_error() {
        let result = DeleteResult::ok(ProviderType::Appwrite, "k");
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains("\"appwrite\""));
    }
}
