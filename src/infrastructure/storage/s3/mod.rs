//! S3 object storage provider.
//!
//! Two construction tiers share the same contract: a rich client backed
//! by the official SDK (behind the `aws-sdk` feature) and a minimal
//! client that signs raw HTTP requests with legacy Signature V2. The
//! provider prefers the SDK tier and falls back to the signed tier when
//! the SDK is not compiled in or fails to construct.

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{info, warn};

#[cfg(feature = "aws-sdk")]
mod sdk;
mod signed;

use super::utils::{
    generate_file_key, validate_file, with_retry, TRANSPORT_BASE_DELAY, TRANSPORT_MAX_RETRIES,
};
use super::{StorageError, StorageProvider};
use crate::domain::{DeleteResult, FileMetadata, ProviderType, UploadError, UploadFile, UploadedFile};
use crate::infrastructure::config::{S3Config, UploadPolicy};

/// Batch deletes run this many keys concurrently per chunk; chunks are
/// processed sequentially.
const DELETE_CHUNK_SIZE: usize = 10;

/// Presigned GET URLs expire after one hour.
pub(crate) const PRESIGN_EXPIRY_SECS: i64 = 3600;

enum Tier {
    #[cfg(feature = "aws-sdk")]
    Sdk(sdk::SdkClient),
    Signed(signed::SignedClient),
}

impl Tier {
    fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "aws-sdk")]
            Tier::Sdk(_) => "sdk",
            Tier::Signed(_) => "signed",
        }
    }
}

/// S3 storage provider over either client tier.
pub struct S3Provider {
    tier: Tier,
    config: S3Config,
}

impl S3Provider {
    /// Construct the provider, preferring the SDK tier.
    ///
    /// With the `aws-sdk` feature disabled the signed tier is used
    /// directly; with it enabled, SDK construction failure downgrades to
    /// the signed tier rather than failing the provider.
    pub fn new(config: S3Config) -> Result<Self, StorageError> {
        #[cfg(feature = "aws-sdk")]
        {
            match sdk::SdkClient::new(&config) {
                Ok(client) => {
                    info!(bucket = %config.bucket, "s3 provider using SDK client");
                    return Ok(Self { tier: Tier::Sdk(client), config });
                }
                Err(e) => {
                    warn!("SDK-backed S3 client unavailable, falling back to signed HTTP: {e}");
                }
            }
        }

        let client = signed::SignedClient::new(&config)?;
        info!(bucket = %config.bucket, "s3 provider using signed HTTP client");
        Ok(Self { tier: Tier::Signed(client), config })
    }

    /// Which client tier is active (`"sdk"` or `"signed"`).
    #[must_use]
    pub fn tier_name(&self) -> &'static str {
        self.tier.name()
    }

    /// Delete many keys: chunks of [`DELETE_CHUNK_SIZE`], members
    /// concurrent within a chunk, chunks sequential. Partial failure is
    /// reported per key.
    pub async fn delete_multiple(&self, keys: &[String]) -> Vec<DeleteResult> {
        let mut results = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(DELETE_CHUNK_SIZE) {
            results.extend(join_all(chunk.iter().map(|key| self.delete(key))).await);
        }
        results
    }

    async fn put(&self, key: &str, file: &UploadFile) -> Result<(), StorageError> {
        match &self.tier {
            #[cfg(feature = "aws-sdk")]
            Tier::Sdk(client) => {
                client
                    .put_object(
                        key,
                        file.data.clone(),
                        &file.mime_type,
                        self.config.public_read,
                        self.config.storage_class.as_deref(),
                    )
                    .await
            }
            Tier::Signed(client) => client.put_object(key, &file.data, &file.mime_type).await,
        }
    }

    async fn head(&self, key: &str) -> Result<Option<FileMetadata>, StorageError> {
        match &self.tier {
            #[cfg(feature = "aws-sdk")]
            Tier::Sdk(client) => client.head_object(key).await,
            Tier::Signed(client) => client.head_object(key).await,
        }
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        match &self.tier {
            #[cfg(feature = "aws-sdk")]
            Tier::Sdk(client) => client.delete_object(key).await,
            Tier::Signed(client) => client.delete_object(key).await,
        }
    }

    async fn presigned_url(&self, key: &str) -> Result<String, StorageError> {
        match &self.tier {
            #[cfg(feature = "aws-sdk")]
            Tier::Sdk(client) => client.presigned_get_url(key, PRESIGN_EXPIRY_SECS).await,
            Tier::Signed(client) => client.presigned_get_url(key, PRESIGN_EXPIRY_SECS),
        }
    }
}

/// Direct object URL: path-style under a custom endpoint, virtual-hosted
/// on AWS proper.
pub(crate) fn object_url(config: &S3Config, key: &str) -> String {
    let key = encode_key(key);
    match &config.endpoint {
        Some(endpoint) => {
            format!("{}/{}/{key}", endpoint.trim_end_matches('/'), config.bucket)
        }
        None => format!("https://{}.s3.{}.amazonaws.com/{key}", config.bucket, config.region),
    }
}

/// Percent-encode each path segment, preserving `/` separators.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/').map(|segment| urlencoding::encode(segment).into_owned()).collect::<Vec<_>>().join("/")
}

#[async_trait]
impl StorageProvider for S3Provider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsS3
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
            .unwrap_or_else(|| generate_file_key(&file.original_name, Some("menu-items")));

        with_retry(
            || self.put(&key, file),
            TRANSPORT_MAX_RETRIES,
            TRANSPORT_BASE_DELAY,
        )
        .await
        .map_err(|e| e.into_upload_error(provider))?;

        let url = match self.url(&key).await {
            Ok(url) => url,
            Err(e) => return Err(e.into_upload_error(provider)),
        };

        info!(
            provider = %provider,
            tier = self.tier.name(),
            key = %key,
            size = file.size,
            duration_ms = started.elapsed().as_millis() as u64,
            "object stored in s3"
        );

        Ok(UploadedFile {
            url,
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

        match self.exists(key).await {
            Ok(true) => {}
            Ok(false) => return DeleteResult::not_found(provider, key),
            Err(e) => return DeleteResult::failed(provider, key, e.to_string()),
        }

        match self.delete_object(key).await {
            Ok(()) => {
                info!(provider = %provider, key = %key, "object deleted from s3");
                DeleteResult::ok(provider, key)
            }
            Err(e) => {
                warn!(provider = %provider, key = %key, "s3 delete failed: {e}");
                DeleteResult::failed(provider, key, e.to_string())
            }
        }
    }

    async fn url(&self, key: &str) -> Result<String, StorageError> {
        if let Some(cdn) = &self.config.cdn_url {
            return Ok(format!("{}/{}", cdn.trim_end_matches('/'), encode_key(key)));
        }
        if self.config.public_read {
            return Ok(object_url(&self.config, key));
        }
        self.presigned_url(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.head(key).await?.is_some())
    }

    async fn metadata(&self, key: &str) -> Option<FileMetadata> {
        self.head(key).await.ok().flatten()
    }
}
