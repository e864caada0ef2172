//! Appwrite storage bucket provider (REST API).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{info, warn};

use super::utils::{
    generate_appwrite_file_key, validate_file, with_retry, TRANSPORT_BASE_DELAY,
    TRANSPORT_MAX_RETRIES,
};
use super::{StorageError, StorageProvider};
use crate::domain::{DeleteResult, FileMetadata, ProviderType, UploadError, UploadFile, UploadedFile};
use crate::infrastructure::config::{AppwriteConfig, UploadPolicy};

/// Appwrite rate limits aggressively; batch deletes run in small chunks
/// with a pause in between. Required pacing, not an optimization.
const DELETE_CHUNK_SIZE: usize = 5;
const DELETE_CHUNK_PAUSE: Duration = Duration::from_secs(1);

pub struct AppwriteProvider {
    http: reqwest::Client,
    config: AppwriteConfig,
}

impl AppwriteProvider {
    pub fn new(config: AppwriteConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder().build().map_err(|e| StorageError::UploadFailed {
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self { http, config: AppwriteConfig {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            ..config
        } })
    }

    fn files_url(&self) -> String {
        format!(
            "{}/storage/buckets/{}/files",
            self.config.endpoint, self.config.bucket_id
        )
    }

    fn file_url(&self, key: &str) -> String {
        format!("{}/{key}", self.files_url())
    }

    fn auth_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Key", &self.config.api_key)
    }

    fn public_url(&self, key: &str) -> String {
        match &self.config.cdn_url {
            Some(cdn) => format!("{}/{key}", cdn.trim_end_matches('/')),
            None => format!(
                "{}/view?project={}",
                self.file_url(key),
                urlencoding::encode(&self.config.project_id)
            ),
        }
    }

    async fn post_file(&self, key: &str, file: &UploadFile) -> Result<(), StorageError> {
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.original_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| StorageError::UploadFailed {
                message: format!("invalid MIME type {}: {e}", file.mime_type),
            })?;

        // Anonymous read so customers can load menu imagery without a
        // session.
        let form = Form::new()
            .text("fileId", key.to_string())
            .text("permissions[]", "read(\"any\")")
            .part("file", part);

        let response = self
            .auth_headers(self.http.post(self.files_url()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed { message: e.to_string() })?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(classify_upload_status(status, &body, &self.config.bucket_id, key))
    }

    /// Delete many keys with rate-limit pacing: chunks of
    /// [`DELETE_CHUNK_SIZE`], one-second pause between chunks.
    pub async fn delete_multiple(&self, keys: &[String]) -> Vec<DeleteResult> {
        let mut results = Vec::with_capacity(keys.len());
        let mut chunks = keys.chunks(DELETE_CHUNK_SIZE).peekable();

        while let Some(chunk) = chunks.next() {
            results.extend(join_all(chunk.iter().map(|key| self.delete(key))).await);
            if chunks.peek().is_some() {
                tokio::time::sleep(DELETE_CHUNK_PAUSE).await;
            }
        }
        results
    }

    async fn fetch_file_document(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let response = self
            .auth_headers(self.http.get(self.file_url(key)))
            .send()
            .await
            .map_err(|e| StorageError::Io { message: e.to_string() })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            // Ambiguous refusal; treated as absent rather than failing
            // the probe.
            return Ok(None);
        }

        let document = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| StorageError::Io { message: e.to_string() })?;
        Ok(Some(document))
    }
}

/// Classify an Appwrite upload rejection by response status.
fn classify_upload_status(
    status: StatusCode,
    body: &str,
    bucket_id: &str,
    key: &str,
) -> StorageError {
    match status.as_u16() {
        401 => StorageError::Unauthorized { message: snippet(body) },
        404 => StorageError::BucketNotFound { bucket: bucket_id.to_string() },
        409 => StorageError::FileExists { key: key.to_string() },
        413 => StorageError::PayloadTooLarge { message: snippet(body) },
        _ => StorageError::UploadFailed { message: format!("status {status}: {}", snippet(body)) },
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > 200 {
        let short: String = trimmed.chars().take(200).collect();
        format!("{short}…")
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl StorageProvider for AppwriteProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Appwrite
    }

    async fn upload(
        &self,
        file: &UploadFile,
        policy: &UploadPolicy,
    ) -> Result<UploadedFile, UploadError> {
        let provider = self.provider_type();
        let started = std::time::Instant::now();

        validate_file(file, policy).map_err(|e| e.into_upload_error(provider))?;

        let key = file
            .key
            .clone()
            .unwrap_or_else(|| generate_appwrite_file_key(Some(&file.original_name)));

        with_retry(
            || self.post_file(&key, file),
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
            "file stored in appwrite bucket"
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

        // Probe first so a benign not-found never masks a real delete
        // failure.
        match self.exists(key).await {
            Ok(true) => {}
            Ok(false) => return DeleteResult::not_found(provider, key),
            Err(e) => return DeleteResult::failed(provider, key, e.to_string()),
        }

        let response = match self
            .auth_headers(self.http.delete(self.file_url(key)))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return DeleteResult::failed(provider, key, e.to_string()),
        };

        // The file vanished between the probe and the delete; fine.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            info!(provider = %provider, key = %key, "file deleted from appwrite");
            return DeleteResult::ok(provider, key);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(provider = %provider, key = %key, "appwrite delete failed: {status}");
        DeleteResult::failed(provider, key, format!("status {status}: {}", snippet(&body)))
    }

    async fn url(&self, key: &str) -> Result<String, StorageError> {
        Ok(self.public_url(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.fetch_file_document(key).await?.is_some())
    }

    async fn metadata(&self, key: &str) -> Option<FileMetadata> {
        let document = self.fetch_file_document(key).await.ok().flatten()?;

        Some(FileMetadata {
            key: key.to_string(),
            size: document.get("sizeOriginal").and_then(serde_json::Value::as_u64).unwrap_or(0),
            content_type: document
                .get("mimeType")
                .and_then(serde_json::Value::as_str)
                .map(String::from),
            last_modified: document
                .get("$updatedAt")
                .and_then(serde_json::Value::as_str)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            etag: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(cdn: Option<&str>) -> AppwriteProvider {
        AppwriteProvider::new(AppwriteConfig {
            endpoint: "https://cloud.appwrite.io/v1/".to_string(),
            project_id: "menu-saas".to_string(),
            api_key: "key".to_string(),
            bucket_id: "menu-images".to_string(),
            cdn_url: cdn.map(String::from),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url_via_api_root() {
        let url = provider(None).public_url("abc123");
        assert_eq!(
            url,
            "https://cloud.appwrite.io/v1/storage/buckets/menu-images/files/abc123/view?project=menu-saas"
        );
    }

    #[test]
    fn test_public_url_via_cdn() {
        let url = provider(Some("https://cdn.menus.example/")).public_url("abc123");
        assert_eq!(url, "https://cdn.menus.example/abc123");
    }

    #[test]
    fn test_classify_upload_status_mapping() {
        let cases = [
            (401, "UNAUTHORIZED"),
            (404, "BUCKET_NOT_FOUND"),
            (409, "FILE_EXISTS"),
            (413, "FILE_TOO_LARGE"),
            (500, "UPLOAD_FAILED"),
        ];
        for (status, expected) in cases {
            let err = classify_upload_status(
                StatusCode::from_u16(status).unwrap(),
                "{}",
                "menu-images",
                "abc",
            );
            assert_eq!(err.code().as_str(), expected, "status {status}");
        }
    }

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let body = "x".repeat(500);
        let short = snippet(&body);
        assert!(short.chars().count() <= 201);
        assert!(short.ends_with('…'));
    }
}
