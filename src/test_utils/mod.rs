//! Scripted providers for orchestration tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    DeleteResult, ErrorCode, FileMetadata, ProviderType, UploadError, UploadFile, UploadedFile,
};
use crate::infrastructure::config::UploadPolicy;
use crate::infrastructure::storage::{StorageError, StorageProvider};

/// Serializes unit tests that touch the process-wide provider registry
/// or service singleton.
pub static GLOBAL_STATE_GUARD: Mutex<()> = Mutex::new(());

/// A provider whose behavior is scripted per test: succeed, fail
/// everything with a given code, or fail specific files by name. Call
/// counts are recorded for interaction assertions.
pub struct ScriptedProvider {
    provider_type: ProviderType,
    fail_all_with: Option<ErrorCode>,
    fail_names: Mutex<HashMap<String, ErrorCode>>,
    exists: AtomicBool,
    upload_calls: AtomicU32,
    delete_calls: AtomicU32,
    url_calls: AtomicU32,
}

impl ScriptedProvider {
    fn new(provider_type: ProviderType, fail_all_with: Option<ErrorCode>) -> Arc<Self> {
        Arc::new(Self {
            provider_type,
            fail_all_with,
            fail_names: Mutex::new(HashMap::new()),
            exists: AtomicBool::new(true),
            upload_calls: AtomicU32::new(0),
            delete_calls: AtomicU32::new(0),
            url_calls: AtomicU32::new(0),
        })
    }

    pub fn set_exists(&self, value: bool) {
        self.exists.store(value, Ordering::SeqCst);
    }

    pub fn fail_upload_for(&self, original_name: &str, code: ErrorCode) {
        self.fail_names.lock().unwrap().insert(original_name.to_string(), code);
    }

    pub fn upload_calls(&self) -> u32 {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn url_calls(&self) -> u32 {
        self.url_calls.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self) -> Option<UploadError> {
        self.fail_all_with
            .map(|code| UploadError::new(self.provider_type, code, "scripted failure"))
    }
}

pub fn succeeding_provider(provider_type: ProviderType) -> Arc<ScriptedProvider> {
    ScriptedProvider::new(provider_type, None)
}

pub fn failing_provider(provider_type: ProviderType, code: ErrorCode) -> Arc<ScriptedProvider> {
    ScriptedProvider::new(provider_type, Some(code))
}

#[async_trait]
impl StorageProvider for ScriptedProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    async fn upload(
        &self,
        file: &UploadFile,
        _policy: &UploadPolicy,
    ) -> Result<UploadedFile, UploadError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.scripted_failure() {
            return Err(err);
        }
        if let Some(code) = self.fail_names.lock().unwrap().get(&file.original_name) {
            return Err(UploadError::new(self.provider_type, *code, "scripted failure"));
        }

        Ok(UploadedFile {
            url: format!("http://{}/files/{}", self.provider_type, file.original_name),
            key: file.original_name.clone(),
            original_name: file.original_name.clone(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            provider: self.provider_type,
            metadata: None,
        })
    }

    async fn delete(&self, key: &str) -> DeleteResult {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        match self.scripted_failure() {
            Some(err) => DeleteResult::failed(self.provider_type, key, err.to_string()),
            None => DeleteResult::ok(self.provider_type, key),
        }
    }

    async fn url(&self, key: &str) -> Result<String, StorageError> {
        self.url_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all_with.is_some() {
            return Err(StorageError::UrlGenerationFailed {
                message: "scripted failure".to_string(),
            });
        }
        Ok(format!("http://{}/files/{key}", self.provider_type))
    }

    async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
        if self.fail_all_with.is_some() {
            return Ok(false);
        }
        Ok(self.exists.load(Ordering::SeqCst))
    }

    async fn metadata(&self, key: &str) -> Option<FileMetadata> {
        if self.fail_all_with.is_some() || !self.exists.load(Ordering::SeqCst) {
            return None;
        }
        Some(FileMetadata {
            key: key.to_string(),
            size: 0,
            content_type: None,
            last_modified: None,
            etag: None,
        })
    }
}
