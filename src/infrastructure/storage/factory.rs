//! Provider factory and process-wide registry.
//!
//! One live instance per provider type: construction goes through a
//! cache keyed by [`ProviderType`], and entries persist until
//! [`clear_cache`] (configuration changes, test teardown).

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AppwriteProvider, LocalProvider, S3Provider, StorageError, StorageProvider};
use crate::domain::{ErrorCode, ProviderType, UploadError};
use crate::infrastructure::config::UploadServiceConfig;

/// Sentinel key probed by [`health_check`]; never written.
const HEALTH_CHECK_KEY: &str = "__health_check_test__";

static PROVIDER_CACHE: Lazy<Mutex<HashMap<ProviderType, Arc<dyn StorageProvider>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Construction-time errors; all fatal for the requested provider.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown or unsupported provider: {provider}")]
    UnknownProvider { provider: ProviderType },

    #[error("Invalid {provider} configuration: {message}")]
    InvalidConfig { provider: ProviderType, message: String },

    #[error("Failed to construct {provider} provider: {source}")]
    Construction {
        provider: ProviderType,
        #[source]
        source: StorageError,
    },
}

impl FactoryError {
    #[must_use]
    pub fn provider(&self) -> ProviderType {
        match self {
            Self::UnknownProvider { provider }
            | Self::InvalidConfig { provider, .. }
            | Self::Construction { provider, .. } => *provider,
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownProvider { .. } => ErrorCode::UnknownProvider,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::Construction { source, .. } => source.code(),
        }
    }

    #[must_use]
    pub fn into_upload_error(self) -> UploadError {
        UploadError::new(self.provider(), self.code(), self.to_string())
    }
}

/// Health probe outcome for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: ProviderType,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Return the cached instance for `provider`, constructing and caching
/// it on first use. Required configuration fields are validated before
/// construction and missing ones are fatal.
pub async fn create_provider(
    provider: ProviderType,
    config: &UploadServiceConfig,
) -> Result<Arc<dyn StorageProvider>, FactoryError> {
    if let Some(cached) = cache_lock().get(&provider) {
        debug!(provider = %provider, "provider served from registry");
        return Ok(cached.clone());
    }

    let instance: Arc<dyn StorageProvider> = match provider {
        ProviderType::Local => {
            let section = config.providers.local.as_ref().ok_or_else(|| missing_section(provider))?;
            require_field(provider, "upload_dir", &section.upload_dir)?;
            require_field(provider, "base_url", &section.base_url)?;
            let built = LocalProvider::new(section.clone())
                .await
                .map_err(|source| FactoryError::Construction { provider, source })?;
            Arc::new(built)
        }
        ProviderType::AwsS3 => {
            let section =
                config.providers.aws_s3.as_ref().ok_or_else(|| missing_section(provider))?;
            require_field(provider, "bucket", &section.bucket)?;
            require_field(provider, "region", &section.region)?;
            require_field(provider, "access_key_id", &section.access_key_id)?;
            require_field(provider, "secret_access_key", &section.secret_access_key)?;
            let built = S3Provider::new(section.clone())
                .map_err(|source| FactoryError::Construction { provider, source })?;
            Arc::new(built)
        }
        ProviderType::Appwrite => {
            let section =
                config.providers.appwrite.as_ref().ok_or_else(|| missing_section(provider))?;
            require_field(provider, "endpoint", &section.endpoint)?;
            require_field(provider, "project_id", &section.project_id)?;
            require_field(provider, "api_key", &section.api_key)?;
            require_field(provider, "bucket_id", &section.bucket_id)?;
            let built = AppwriteProvider::new(section.clone())
                .map_err(|source| FactoryError::Construction { provider, source })?;
            Arc::new(built)
        }
        ProviderType::Gcs | ProviderType::Cloudinary | ProviderType::AzureBlob => {
            return Err(FactoryError::UnknownProvider { provider });
        }
    };

    info!(provider = %provider, "storage provider constructed");
    cache_lock().insert(provider, instance.clone());
    Ok(instance)
}

/// Attempt construction of every known provider type and return the
/// subset that succeeds. Construction errors mean unavailability, not
/// failure.
pub async fn available_providers(config: &UploadServiceConfig) -> Vec<ProviderType> {
    let mut available = Vec::new();
    for provider in ProviderType::all() {
        match create_provider(*provider, config).await {
            Ok(_) => available.push(*provider),
            Err(e) => debug!(provider = %provider, "provider unavailable: {e}"),
        }
    }
    available
}

/// Probe reachability by asking the provider whether the sentinel key
/// exists. The answer does not matter, only whether the probe completed.
pub async fn health_check(provider: ProviderType, config: &UploadServiceConfig) -> HealthStatus {
    let instance = match create_provider(provider, config).await {
        Ok(instance) => instance,
        Err(e) => {
            return HealthStatus { provider, healthy: false, error: Some(e.to_string()) };
        }
    };

    match instance.exists(HEALTH_CHECK_KEY).await {
        Ok(_) => HealthStatus { provider, healthy: true, error: None },
        Err(e) => {
            warn!(provider = %provider, "health check failed: {e}");
            HealthStatus { provider, healthy: false, error: Some(e.to_string()) }
        }
    }
}

/// Empty the registry. Cached instances already handed out keep working;
/// the next `create_provider` call rebuilds from current configuration.
pub fn clear_cache() {
    cache_lock().clear();
}

fn missing_section(provider: ProviderType) -> FactoryError {
    FactoryError::InvalidConfig {
        provider,
        message: format!("no configuration section for provider {provider}"),
    }
}

fn require_field(provider: ProviderType, field: &str, value: &str) -> Result<(), FactoryError> {
    if value.trim().is_empty() {
        return Err(FactoryError::InvalidConfig {
            provider,
            message: format!("missing required field: {field}"),
        });
    }
    Ok(())
}

fn cache_lock()
-> std::sync::MutexGuard<'static, HashMap<ProviderType, Arc<dyn StorageProvider>>> {
    PROVIDER_CACHE.lock().unwrap_or_else(PoisonError::into_inner)
}
