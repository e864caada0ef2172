//! Shared helpers: upload validation, storage-key generation and
//! retry-with-backoff.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use super::StorageError;
use crate::domain::UploadFile;
use crate::infrastructure::config::UploadPolicy;

/// Attempts made for each provider transport call.
pub const TRANSPORT_MAX_RETRIES: u32 = 3;

/// Base delay for the exponential backoff between transport attempts.
pub const TRANSPORT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Appwrite file ids are limited to 36 chars from `[A-Za-z0-9._-]`.
const APPWRITE_KEY_MAX_LEN: usize = 36;

/// Validate an inbound file against the upload policy.
///
/// Check order is fixed for deterministic error reporting:
/// size, then MIME type, then extension, then emptiness.
pub fn validate_file(file: &UploadFile, policy: &UploadPolicy) -> Result<(), StorageError> {
    if file.size > policy.max_file_size {
        return Err(StorageError::FileTooLarge { size: file.size, max: policy.max_file_size });
    }

    if !policy.allowed_mime_types.iter().any(|m| m.eq_ignore_ascii_case(&file.mime_type)) {
        return Err(StorageError::InvalidMimeType { mime: file.mime_type.clone() });
    }

    let extension = file_extension(&file.original_name).unwrap_or_default();
    if !policy.allowed_extensions.iter().any(|e| e.eq_ignore_ascii_case(&extension)) {
        return Err(StorageError::InvalidExtension { extension });
    }

    if file.size == 0 {
        return Err(StorageError::EmptyFile);
    }

    Ok(())
}

/// Generate a collision-resistant, URL- and filesystem-safe storage key.
///
/// Shape: `[prefix/]<sanitized-stem>_<millis>_<8-hex>.<ext>`. Non
/// alphanumeric characters in the stem are replaced with `_`.
#[must_use]
pub fn generate_file_key(original_name: &str, prefix: Option<&str>) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("file");

    let sanitized: String =
        stem.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();

    let timestamp = Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random();

    let name = match file_extension(original_name) {
        Some(ext) => format!("{sanitized}_{timestamp}_{suffix:08x}.{ext}"),
        None => format!("{sanitized}_{timestamp}_{suffix:08x}"),
    };

    match prefix {
        Some(prefix) => format!("{}/{name}", prefix.trim_matches('/')),
        None => name,
    }
}

/// Generate a storage key within Appwrite's file-id constraints:
/// at most 36 chars from `[A-Za-z0-9._-]`.
///
/// A 32-hex UUID forms the core; when the original extension fits the
/// budget the core is truncated to make room for it.
#[must_use]
pub fn generate_appwrite_file_key(original_name: Option<&str>) -> String {
    let core = Uuid::new_v4().simple().to_string();

    let extension = original_name
        .and_then(file_extension)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .filter(|ext| ext.len() + 1 < APPWRITE_KEY_MAX_LEN);

    match extension {
        Some(ext) => {
            let core_len = (APPWRITE_KEY_MAX_LEN - ext.len() - 1).min(core.len());
            format!("{}.{ext}", &core[..core_len])
        }
        None => core,
    }
}

/// Run `operation` up to `max_retries` times with exponential backoff
/// (`base_delay * 2^(attempt-1)`, no jitter), returning the last error
/// after exhaustion.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_retries => {
                let delay = base_delay * 2u32.pow(attempt - 1);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying: {error}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

fn file_extension(name: &str) -> Option<String> {
    Path::new(name).extension().and_then(|e| e.to_str()).map(str::to_lowercase)
}
