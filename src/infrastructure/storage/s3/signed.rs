//! Minimal S3 client signing raw HTTP requests with legacy AWS
//! Signature Version 2 (HMAC-SHA1 over the canonicalized request).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use sha1::Sha1;

use super::super::StorageError;
use super::{encode_key, object_url};
use crate::domain::FileMetadata;
use crate::infrastructure::config::S3Config;

type HmacSha1 = Hmac<Sha1>;

pub struct SignedClient {
    http: reqwest::Client,
    config: S3Config,
}

impl SignedClient {
    pub fn new(config: &S3Config) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder().build().map_err(|e| StorageError::UploadFailed {
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self { http, config: config.clone() })
    }

    pub async fn put_object(
        &self,
        key: &str,
        data: &Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let date = http_date(Utc::now());
        let mut amz_headers = Vec::new();
        if self.config.public_read {
            amz_headers.push(("x-amz-acl".to_string(), "public-read".to_string()));
        }
        if let Some(class) = &self.config.storage_class {
            amz_headers.push(("x-amz-storage-class".to_string(), class.clone()));
        }

        let authorization =
            self.authorization("PUT", "", content_type, &date, &amz_headers, key)?;

        let mut request = self
            .http
            .put(object_url(&self.config, key))
            .header("Date", &date)
            .header("Content-Type", content_type)
            .header("Authorization", authorization);
        for (name, value) in &amz_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(data.clone())
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed { message: e.to_string() })?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(classify_fault(status, &body, &self.config.bucket))
    }

    /// HEAD probe. `Ok(None)` covers both a missing object and ambiguous
    /// remote refusals; only transport failure is an error.
    pub async fn head_object(&self, key: &str) -> Result<Option<FileMetadata>, StorageError> {
        let date = http_date(Utc::now());
        let authorization = self.authorization("HEAD", "", "", &date, &[], key)?;

        let response = self
            .http
            .head(object_url(&self.config, key))
            .header("Date", &date)
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|e| StorageError::Io { message: e.to_string() })?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let headers = response.headers();
        let size = headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let content_type =
            headers.get("content-type").and_then(|v| v.to_str().ok()).map(String::from);
        let last_modified = headers
            .get("last-modified")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let etag = headers
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        Ok(Some(FileMetadata { key: key.to_string(), size, content_type, last_modified, etag }))
    }

    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let date = http_date(Utc::now());
        let authorization = self.authorization("DELETE", "", "", &date, &[], key)?;

        let response = self
            .http
            .delete(object_url(&self.config, key))
            .header("Date", &date)
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed { message: e.to_string() })?;

        // S3 deletes are idempotent: 404 means already gone.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(classify_fault(status, &body, &self.config.bucket))
    }

    /// Query-string authenticated GET URL for private objects.
    pub fn presigned_get_url(&self, key: &str, expiry_secs: i64) -> Result<String, StorageError> {
        let expires = Utc::now().timestamp() + expiry_secs;
        let string_to_sign =
            format!("GET\n\n\n{expires}\n{}", self.canonical_resource(key));
        let signature = self.sign(&string_to_sign)?;

        Ok(format!(
            "{}?AWSAccessKeyId={}&Expires={}&Signature={}",
            object_url(&self.config, key),
            urlencoding::encode(&self.config.access_key_id),
            expires,
            urlencoding::encode(&signature),
        ))
    }

    /// `Authorization: AWS <access-key>:<signature>` over the V2
    /// string-to-sign: method, content-MD5, content-type, date,
    /// canonicalized `x-amz-*` headers, canonicalized resource.
    fn authorization(
        &self,
        method: &str,
        content_md5: &str,
        content_type: &str,
        date: &str,
        amz_headers: &[(String, String)],
        key: &str,
    ) -> Result<String, StorageError> {
        let mut sorted: Vec<&(String, String)> = amz_headers.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let canonical_amz: String =
            sorted.iter().map(|(name, value)| format!("{name}:{value}\n")).collect();

        let string_to_sign = format!(
            "{method}\n{content_md5}\n{content_type}\n{date}\n{canonical_amz}{}",
            self.canonical_resource(key)
        );
        let signature = self.sign(&string_to_sign)?;

        Ok(format!("AWS {}:{signature}", self.config.access_key_id))
    }

    fn canonical_resource(&self, key: &str) -> String {
        format!("/{}/{}", self.config.bucket, encode_key(key))
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, StorageError> {
        let mut mac = HmacSha1::new_from_slice(self.config.secret_access_key.as_bytes())
            .map_err(|_| StorageError::InvalidSignature {
                message: "failed to initialize HMAC".to_string(),
            })?;
        mac.update(string_to_sign.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

/// Map an S3 fault response onto the error taxonomy. The XML `<Code>` is
/// authoritative when present, the HTTP status otherwise.
pub(super) fn classify_fault(status: StatusCode, body: &str, bucket: &str) -> StorageError {
    match extract_xml_code(body).as_deref() {
        Some("NoSuchBucket") => {
            return StorageError::BucketNotFound { bucket: bucket.to_string() };
        }
        Some("AccessDenied") => {
            return StorageError::AccessDenied { message: extract_xml_message(body) };
        }
        Some("InvalidAccessKeyId") => {
            return StorageError::InvalidCredentials { message: extract_xml_message(body) };
        }
        Some("SignatureDoesNotMatch") => {
            return StorageError::InvalidSignature { message: extract_xml_message(body) };
        }
        _ => {}
    }

    match status.as_u16() {
        404 => StorageError::BucketNotFound { bucket: bucket.to_string() },
        401 => StorageError::InvalidCredentials { message: format!("status {status}") },
        403 => StorageError::AccessDenied { message: format!("status {status}") },
        _ => StorageError::UploadFailed { message: format!("status {status}") },
    }
}

fn extract_xml_code(body: &str) -> Option<String> {
    extract_xml_tag(body, "Code")
}

fn extract_xml_message(body: &str) -> String {
    extract_xml_tag(body, "Message").unwrap_or_else(|| "request rejected".to_string())
}

fn extract_xml_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].to_string())
}

fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
