//! Signed-tier S3 provider against a mock HTTP endpoint: request
//! shapes, fault classification, retry exhaustion and batch deletes.

#![cfg(not(feature = "aws-sdk"))]

use wiremock::matchers::{header, header_exists, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use menu_upload_service::infrastructure::config::{S3Config, UploadPolicy};
use menu_upload_service::infrastructure::storage::{S3Provider, StorageProvider};
use menu_upload_service::{ErrorCode, UploadFile};

fn config(endpoint: &str) -> S3Config {
    S3Config {
        bucket: "menus".to_string(),
        region: "us-east-1".to_string(),
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        endpoint: Some(endpoint.to_string()),
        cdn_url: None,
        public_read: true,
        storage_class: None,
    }
}

fn image_policy() -> UploadPolicy {
    UploadPolicy {
        max_file_size: 1024,
        allowed_mime_types: vec!["image/png".to_string()],
        allowed_extensions: vec!["png".to_string()],
    }
}

fn png() -> UploadFile {
    UploadFile::new(&b"fake png"[..], "dish.png", "image/png")
}

#[tokio::test]
async fn upload_sends_signed_put_with_acl_header() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/menus/menu-items/dish_\d+_[0-9a-f]{8}\.png$"))
        .and(header_exists("authorization"))
        .and(header_exists("date"))
        .and(header("x-amz-acl", "public-read"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = S3Provider::new(config(&server.uri())).unwrap();
    let uploaded = provider.upload(&png(), &image_policy()).await.expect("upload");

    assert!(uploaded.key.starts_with("menu-items/dish_"));
    // public_read: direct object URL, path-style under the custom
    // endpoint.
    assert_eq!(uploaded.url, format!("{}/menus/{}", server.uri(), uploaded.key));
}

#[tokio::test]
async fn upload_fault_is_classified_after_retry_exhaustion() {
    let server = MockServer::start().await;

    let body = "<Error><Code>NoSuchBucket</Code><Message>menus does not exist</Message></Error>";
    Mock::given(method("PUT"))
        .and(path_regex("^/menus/"))
        .respond_with(ResponseTemplate::new(404).set_body_string(body))
        .expect(3) // transport retried three times before reporting
        .mount(&server)
        .await;

    let provider = S3Provider::new(config(&server.uri())).unwrap();
    let err = provider.upload(&png(), &image_policy()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::BucketNotFound);
}

#[tokio::test]
async fn upload_access_denied_classification() {
    let server = MockServer::start().await;

    let body = "<Error><Code>AccessDenied</Code><Message>nope</Message></Error>";
    Mock::given(method("PUT"))
        .and(path_regex("^/menus/"))
        .respond_with(ResponseTemplate::new(403).set_body_string(body))
        .expect(3)
        .mount(&server)
        .await;

    let provider = S3Provider::new(config(&server.uri())).unwrap();
    let err = provider.upload(&png(), &image_policy()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::AccessDenied);
}

#[tokio::test]
async fn exists_maps_head_status() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/menus/present.png"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/menus/absent.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = S3Provider::new(config(&server.uri())).unwrap();
    assert!(provider.exists("present.png").await.unwrap());
    assert!(!provider.exists("absent.png").await.unwrap());
}

#[tokio::test]
async fn delete_confirms_existence_before_transport() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/menus/ghost.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    // The delete transport must never be contacted for an absent key.
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let provider = S3Provider::new(config(&server.uri())).unwrap();
    let result = provider.delete("ghost.png").await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("File not found"));
}

#[tokio::test]
async fn delete_happy_path() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/menus/old.png"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/menus/old.png"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = S3Provider::new(config(&server.uri())).unwrap();
    let result = provider.delete("old.png").await;
    assert!(result.success);
}

#[tokio::test]
async fn metadata_parses_head_headers() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/menus/meta.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 5])
                .insert_header("content-type", "image/png")
                .insert_header("etag", "\"abc123\"")
                .insert_header("last-modified", "Sat, 14 Mar 2026 09:26:53 GMT"),
        )
        .mount(&server)
        .await;

    let provider = S3Provider::new(config(&server.uri())).unwrap();
    let metadata = provider.metadata("meta.png").await.expect("metadata");

    assert_eq!(metadata.content_type.as_deref(), Some("image/png"));
    assert_eq!(metadata.etag.as_deref(), Some("abc123"));
    assert!(metadata.last_modified.is_some());
    assert_eq!(metadata.size, 5);
}

#[tokio::test]
async fn delete_multiple_reports_each_key() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path_regex("^/menus/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(12)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex("^/menus/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(12)
        .mount(&server)
        .await;

    let provider = S3Provider::new(config(&server.uri())).unwrap();
    let keys: Vec<String> = (0..12).map(|i| format!("bulk/{i}.png")).collect();

    let results = provider.delete_multiple(&keys).await;
    assert_eq!(results.len(), 12);
    assert!(results.iter().all(|r| r.success));
    // Order of the result vector mirrors the input keys.
    assert_eq!(results[7].key, "bulk/7.png");
}
