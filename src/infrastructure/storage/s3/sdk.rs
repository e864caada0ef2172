//! Rich S3 client tier backed by the official AWS SDK.
//!
//! Only compiled with the `aws-sdk` feature; the signed tier covers the
//! same contract when the SDK is unavailable.

use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ObjectCannedAcl, StorageClass};
use aws_types::region::Region;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::super::StorageError;
use crate::domain::FileMetadata;
use crate::infrastructure::config::S3Config;

pub struct SdkClient {
    client: Client,
    bucket: String,
}

impl SdkClient {
    pub fn new(config: &S3Config) -> Result<Self, StorageError> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "menu-upload-service",
        );

        let region = if config.region.is_empty() {
            "us-east-1".to_string()
        } else {
            config.region.clone()
        };

        let mut builder = aws_sdk_s3::config::Builder::new()
            .region(Region::new(region))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self { client: Client::from_conf(builder.build()), bucket: config.bucket.clone() })
    }

    pub async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        public_read: bool,
        storage_class: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data));

        if public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }
        if let Some(class) = storage_class {
            request = request.storage_class(StorageClass::from(class));
        }

        request.send().await.map_err(|e| {
            classify_sdk_fault(&DisplayErrorContext(&e).to_string(), &self.bucket)
        })?;
        Ok(())
    }

    pub async fn head_object(&self, key: &str) -> Result<Option<FileMetadata>, StorageError> {
        let output = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    return Ok(None);
                }
                let message = DisplayErrorContext(&service_error).to_string();
                // Refusals are ambiguous existence answers, not failures.
                if message.contains("AccessDenied") || message.contains("Forbidden") {
                    return Ok(None);
                }
                return Err(classify_sdk_fault(&message, &self.bucket));
            }
        };

        Ok(Some(FileMetadata {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(String::from),
            last_modified: output
                .last_modified()
                .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.secs(), 0)),
            etag: output.e_tag().map(|tag| tag.trim_matches('"').to_string()),
        }))
    }

    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed {
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    pub async fn presigned_get_url(
        &self,
        key: &str,
        expiry_secs: i64,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(std::time::Duration::from_secs(
            expiry_secs.max(0) as u64,
        ))
        .map_err(|e| StorageError::PresignedUrlFailed { message: e.to_string() })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::PresignedUrlFailed {
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(request.uri().to_string())
    }
}

/// SDK errors carry their S3 fault code in the rendered message; map it
/// onto the same taxonomy the signed tier uses.
fn classify_sdk_fault(message: &str, bucket: &str) -> StorageError {
    if message.contains("NoSuchBucket") {
        StorageError::BucketNotFound { bucket: bucket.to_string() }
    } else if message.contains("InvalidAccessKeyId") {
        StorageError::InvalidCredentials { message: message.to_string() }
    } else if message.contains("SignatureDoesNotMatch") {
        StorageError::InvalidSignature { message: message.to_string() }
    } else if message.contains("AccessDenied") {
        StorageError::AccessDenied { message: message.to_string() }
    } else {
        StorageError::UploadFailed { message: message.to_string() }
    }
}
