//! Local filesystem storage provider.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};

use super::utils::{
    generate_file_key, validate_file, with_retry, TRANSPORT_BASE_DELAY, TRANSPORT_MAX_RETRIES,
};
use super::{StorageError, StorageProvider};
use crate::domain::{DeleteResult, FileMetadata, ProviderType, UploadError, UploadFile, UploadedFile};
use crate::infrastructure::config::{LocalConfig, UploadPolicy};

/// Stores files under a configured directory and serves them from a
/// public base URL.
pub struct LocalProvider {
    upload_dir: PathBuf,
    base_url: String,
}

/// Outcome of a [`LocalProvider::cleanup_older_than`] scan.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanupReport {
    pub removed: u64,
    pub freed_bytes: u64,
    pub errors: Vec<String>,
}

/// Outcome of a [`LocalProvider::storage_usage`] scan.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StorageUsage {
    pub file_count: u64,
    pub total_bytes: u64,
    pub errors: Vec<String>,
}

impl LocalProvider {
    /// Create the provider, ensuring the upload directory exists
    /// (`mkdir -p` semantics). Construction fails fatally when the
    /// directory cannot be created.
    pub async fn new(config: LocalConfig) -> Result<Self, StorageError> {
        if config.upload_dir.is_empty() {
            return Err(StorageError::DirectoryError {
                message: "upload_dir must not be empty".to_string(),
            });
        }

        let upload_dir = PathBuf::from(&config.upload_dir);
        fs::create_dir_all(&upload_dir).await.map_err(|e| StorageError::DirectoryError {
            message: format!("failed to create {}: {e}", upload_dir.display()),
        })?;

        Ok(Self { upload_dir, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.upload_dir.join(key)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.base_url)
    }

    /// Remove files older than `days` days, recursively. Best-effort:
    /// per-file errors are collected, the scan never aborts.
    pub async fn cleanup_older_than(&self, days: u32) -> CleanupReport {
        let cutoff = SystemTime::now() - Duration::from_secs(u64::from(days) * 86_400);
        let mut report = CleanupReport::default();
        let mut stack = vec![self.upload_dir.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    report.errors.push(format!("{}: {e}", dir.display()));
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        report.errors.push(format!("{}: {e}", dir.display()));
                        break;
                    }
                };

                let path = entry.path();
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        report.errors.push(format!("{}: {e}", path.display()));
                        continue;
                    }
                };

                if metadata.is_dir() {
                    stack.push(path);
                    continue;
                }

                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                if modified >= cutoff {
                    continue;
                }

                match fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!(path = %path.display(), "removed stale file");
                        report.removed += 1;
                        report.freed_bytes += metadata.len();
                    }
                    Err(e) => report.errors.push(format!("{}: {e}", path.display())),
                }
            }
        }

        info!(
            removed = report.removed,
            freed_bytes = report.freed_bytes,
            errors = report.errors.len(),
            "local cleanup finished"
        );
        report
    }

    /// Count stored files and total bytes, recursively. Best-effort like
    /// [`Self::cleanup_older_than`].
    pub async fn storage_usage(&self) -> StorageUsage {
        let mut usage = StorageUsage::default();
        let mut stack = vec![self.upload_dir.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    usage.errors.push(format!("{}: {e}", dir.display()));
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        usage.errors.push(format!("{}: {e}", dir.display()));
                        break;
                    }
                };

                let path = entry.path();
                match entry.metadata().await {
                    Ok(metadata) if metadata.is_dir() => stack.push(path),
                    Ok(metadata) => {
                        usage.file_count += 1;
                        usage.total_bytes += metadata.len();
                    }
                    Err(e) => usage.errors.push(format!("{}: {e}", path.display())),
                }
            }
        }

        usage
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Local
    }

    async fn upload(
        &self,
        file: &UploadFile,
        policy: &UploadPolicy,
    ) -> Result<UploadedFile, UploadError> {
        let provider = self.provider_type();
        let started = std::time::Instant::now();

        validate_file(file, policy).map_err(|e| e.into_upload_error(provider))?;

        let key =
            file.key.clone().unwrap_or_else(|| generate_file_key(&file.original_name, None));
        let path = self.full_path(&key);

        let path_ref = &path;
        let data = &file.data;
        with_retry(
            move || async move {
                // Nested keys need their parent directories first.
                if let Some(parent) = path_ref.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(path_ref, data).await?;
                Ok::<(), StorageError>(())
            },
            TRANSPORT_MAX_RETRIES,
            TRANSPORT_BASE_DELAY,
        )
        .await
        .map_err(|e| e.into_upload_error(provider))?;

        info!(
            provider = %provider,
            key = %key,
            size = file.size,
            duration_ms = started.elapsed().as_millis() as u64,
            "file stored locally"
        );

        Ok(UploadedFile {
            url: self.public_url(&key),
            key,
            original_name: file.original_name.clone(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            provider,
            metadata: None,
        })
    }

    async fn delete(&self, key: &str) -> DeleteResult {
        let provider = self.provider_type();
        let path = self.full_path(key);

        match fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => return DeleteResult::not_found(provider, key),
            Err(e) => return DeleteResult::failed(provider, key, e.to_string()),
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(provider = %provider, key = %key, "file deleted");
                DeleteResult::ok(provider, key)
            }
            Err(e) => {
                warn!(provider = %provider, key = %key, "delete failed: {e}");
                DeleteResult::failed(provider, key, e.to_string())
            }
        }
    }

    async fn url(&self, key: &str) -> Result<String, StorageError> {
        Ok(self.public_url(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.full_path(key)).await?)
    }

    async fn metadata(&self, key: &str) -> Option<FileMetadata> {
        let path = self.full_path(key);
        let metadata = fs::metadata(&path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }

        // Content hash stands in for the etag a remote store would
        // return.
        let etag = fs::read(&path).await.ok().map(|data| {
            let mut hasher = Sha256::new();
            hasher.update(&data);
            hex::encode(hasher.finalize())
        });

        Some(FileMetadata {
            key: key.to_string(),
            size: metadata.len(),
            content_type: mime_guess::from_path(key).first().map(|m| m.to_string()),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            etag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_ok, assert_some};
    use tempfile::TempDir;

    fn test_policy() -> UploadPolicy {
        UploadPolicy {
            max_file_size: 1024,
            allowed_mime_types: vec!["text/plain".to_string(), "image/png".to_string()],
            allowed_extensions: vec!["txt".to_string(), "png".to_string()],
        }
    }

    async fn test_provider(dir: &TempDir) -> LocalProvider {
        LocalProvider::new(LocalConfig {
            upload_dir: dir.path().to_string_lossy().to_string(),
            base_url: "http://x/files".to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_construction_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");

        let provider = LocalProvider::new(LocalConfig {
            upload_dir: nested.to_string_lossy().to_string(),
            base_url: "http://x".to_string(),
        })
        .await;

        assert_ok!(&provider);
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_construction_rejects_empty_dir() {
        let result = LocalProvider::new(LocalConfig {
            upload_dir: String::new(),
            base_url: "http://x".to_string(),
        })
        .await;

        assert!(matches!(result, Err(StorageError::DirectoryError { .. })));
    }

    #[tokio::test]
    async fn test_upload_exists_delete_cycle() {
        let dir = TempDir::new().unwrap();
        let provider = test_provider(&dir).await;

        let file = UploadFile::new(&b"hi"[..], "a.txt", "text/plain");
        let uploaded = provider.upload(&file, &test_policy()).await.unwrap();

        assert_eq!(uploaded.provider, ProviderType::Local);
        assert_eq!(uploaded.url, format!("http://x/files/{}", uploaded.key));
        assert!(uploaded.key.starts_with("a_"));
        assert!(uploaded.key.ends_with(".txt"));

        assert!(provider.exists(&uploaded.key).await.unwrap());

        let deleted = provider.delete(&uploaded.key).await;
        assert!(deleted.success);
        assert!(!provider.exists(&uploaded.key).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_rejects_disallowed_file_without_writing() {
        let dir = TempDir::new().unwrap();
        let provider = test_provider(&dir).await;

        let file = UploadFile::new(&b"x"[..], "a.exe", "application/x-msdownload");
        let err = provider.upload(&file, &test_policy()).await.unwrap_err();
        assert!(err.code.is_validation());

        let usage = provider.storage_usage().await;
        assert_eq!(usage.file_count, 0);
    }

    #[tokio::test]
    async fn test_upload_supports_nested_keys() {
        let dir = TempDir::new().unwrap();
        let provider = test_provider(&dir).await;

        let file =
            UploadFile::new(&b"png"[..], "a.png", "image/png").with_key("menus/42/cover.png");
        let uploaded = provider.upload(&file, &test_policy()).await.unwrap();

        assert_eq!(uploaded.key, "menus/42/cover.png");
        assert!(dir.path().join("menus/42/cover.png").is_file());
    }

    #[tokio::test]
    async fn test_delete_missing_key_skips_transport() {
        let dir = TempDir::new().unwrap();
        let provider = test_provider(&dir).await;

        let result = provider.delete("never-uploaded.png").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("File not found"));
    }

    #[tokio::test]
    async fn test_metadata_roundtrip_and_miss() {
        let dir = TempDir::new().unwrap();
        let provider = test_provider(&dir).await;

        let file = UploadFile::new(&b"12345"[..], "a.png", "image/png");
        let uploaded = provider.upload(&file, &test_policy()).await.unwrap();

        let metadata = assert_some!(provider.metadata(&uploaded.key).await);
        assert_eq!(metadata.size, 5);
        assert_eq!(metadata.content_type.as_deref(), Some("image/png"));
        assert!(metadata.last_modified.is_some());
        // SHA-256 of "12345".
        assert_eq!(
            metadata.etag.as_deref(),
            Some("5994471abb01112afcc18159f6cc74b4f511b99806da59b3caf5a9c173cacfc5")
        );

        assert!(provider.metadata("missing.png").await.is_none());
    }

    #[tokio::test]
    async fn test_storage_usage_counts_nested_files() {
        let dir = TempDir::new().unwrap();
        let provider = test_provider(&dir).await;
        let policy = test_policy();

        for key in ["a.txt", "sub/b.txt", "sub/deep/c.txt"] {
            let file = UploadFile::new(&b"123"[..], "x.txt", "text/plain").with_key(key);
            provider.upload(&file, &policy).await.unwrap();
        }

        let usage = provider.storage_usage().await;
        assert_eq!(usage.file_count, 3);
        assert_eq!(usage.total_bytes, 9);
        assert!(usage.errors.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_stale_files() {
        let dir = TempDir::new().unwrap();
        let provider = test_provider(&dir).await;
        let policy = test_policy();

        let file = UploadFile::new(&b"old"[..], "x.txt", "text/plain").with_key("old.txt");
        provider.upload(&file, &policy).await.unwrap();

        // A zero-day horizon treats everything already on disk as stale.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = provider.cleanup_older_than(0).await;
        assert_eq!(report.removed, 1);
        assert_eq!(report.freed_bytes, 3);
        assert!(!provider.exists("old.txt").await.unwrap());
    }
}
