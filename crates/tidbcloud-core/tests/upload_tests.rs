//! Pre-signed PUT uploads and multipart sessions

mod common;

use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use tidbcloud_core::legacy::LegacyClient;
use tidbcloud_core::{CallContext, CoreError, UploadState};
use wiremock::matchers::{body_bytes, body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Single PUT
// ============================================================================

#[tokio::test]
async fn test_put_object_sends_exact_bytes_without_digest() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/bucket/object.csv"))
        .and(header("content-length", "11"))
        .and(header("user-agent", common::USER_AGENT))
        .and(body_bytes(b"id,name\n1,a".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .expect(0)
        .mount(&server)
        .await;

    let uploader = common::registry(&server).uploader().unwrap();
    uploader
        .put_object(
            &CallContext::new(),
            &format!("{}/bucket/object.csv", server.uri()),
            &b"id,name\n1,a"[..],
            11,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_short_body_is_length_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let uploader = common::registry(&server).uploader().unwrap();
    let err = uploader
        .put_object(
            &CallContext::new(),
            &format!("{}/bucket/short", server.uri()),
            &[7u8; 50][..],
            100,
        )
        .await
        .unwrap_err();

    match err {
        CoreError::UploadLengthMismatch {
            declared,
            transferred,
        } => {
            assert_eq!(declared, 100);
            assert_eq!(transferred, 50);
        }
        other => panic!("expected UploadLengthMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_long_body_is_length_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let uploader = common::registry(&server).uploader().unwrap();
    let err = uploader
        .put_object(
            &CallContext::new(),
            &format!("{}/bucket/long", server.uri()),
            &[7u8; 64][..],
            10,
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, CoreError::UploadLengthMismatch { declared: 10, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_storage_rejection_keeps_trace_id() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-debug-trace-id", "s3-trace")
                .set_body_string("<Error><Code>SignatureDoesNotMatch</Code></Error>"),
        )
        .mount(&server)
        .await;

    let uploader = common::registry(&server).uploader().unwrap();
    let err = uploader
        .put_object(
            &CallContext::new(),
            &format!("{}/bucket/denied", server.uri()),
            &b"abc"[..],
            3,
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert_eq!(err.trace_id(), Some("s3-trace"));
    assert!(err.to_string().contains("SignatureDoesNotMatch"));
}

#[tokio::test]
async fn test_upload_file_end_to_end() {
    let server = MockServer::start().await;
    let upload_url = format!("{}/staging/abc-data.csv", server.uri());

    Mock::given(method("POST"))
        .and(path("/api/v1beta/projects/1/clusters/42/upload_url"))
        .and(body_json(json!({"file_name": "data.csv", "content_length": 14})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": upload_url,
            "new_file_name": "abc-data.csv"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/staging/abc-data.csv"))
        .and(body_bytes(b"id,name\n1,tidb".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("data.csv");
    std::fs::write(&file_path, b"id,name\n1,tidb").unwrap();

    let registry = common::registry(&server);
    let legacy: LegacyClient = registry.legacy().unwrap();
    let staged = registry
        .uploader()
        .unwrap()
        .upload_file(&CallContext::new(), &legacy, "1", "42", &file_path)
        .await
        .unwrap();

    assert_eq!(staged.file_name, "data.csv");
    assert_eq!(staged.content_length, 14);
    assert_eq!(staged.new_file_name, "abc-data.csv");
    assert_eq!(staged.state, UploadState::Uploaded);
}

#[tokio::test]
async fn test_upload_missing_file_fails_before_any_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let registry = common::registry(&server);
    let legacy = registry.legacy().unwrap();
    let err = registry
        .uploader()
        .unwrap()
        .upload_file(
            &CallContext::new(),
            &legacy,
            "1",
            "42",
            std::path::Path::new("/nonexistent/tidbcloud/data.csv"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::File { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_upload_url_refusal_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1beta/projects/1/clusters/42/upload_url"))
        .respond_with(ResponseTemplate::new(400).set_body_string("file too large"))
        .mount(&server)
        .await;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"payload").unwrap();

    let registry = common::registry(&server);
    let legacy = registry.legacy().unwrap();
    let err = registry
        .uploader()
        .unwrap()
        .upload_file(&CallContext::new(), &legacy, "1", "42", file.path())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("file too large"));
}

// ============================================================================
// Multipart
// ============================================================================

async fn start_three_parts(server: &MockServer) {
    let parts: Vec<_> = (1..=3)
        .map(|n| json!({"part_number": n, "url": format!("{}/parts/{n}", server.uri())}))
        .collect();
    Mock::given(method("POST"))
        .and(path("/v1beta1/clusters/c1/uploads"))
        .and(body_json(json!({
            "file_name": "big.csv",
            "content_length": 9,
            "part_count": 3
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_id": "up-1",
            "parts": parts
        })))
        .expect(1)
        .mount(server)
        .await;

    for n in 1..=3 {
        Mock::given(method("PUT"))
            .and(path(format!("/parts/{n}")))
            .respond_with(ResponseTemplate::new(200).insert_header("etag", format!("\"etag-{n}\"")))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_multipart_incomplete_then_complete() {
    let server = MockServer::start().await;
    start_three_parts(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1beta1/clusters/c1/uploads/complete"))
        .and(body_json(json!({
            "upload_id": "up-1",
            "parts": [
                {"part_number": 1, "etag": "\"etag-1\""},
                {"part_number": 2, "etag": "\"etag-2\""},
                {"part_number": 3, "etag": "\"etag-3\""}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = common::registry(&server);
    let serverless = registry.serverless().unwrap();
    let uploader = registry.uploader().unwrap();
    let ctx = CallContext::new();

    let mut upload = uploader
        .start_multipart(&ctx, &serverless, "c1", "big.csv", 9, 3)
        .await
        .unwrap();
    assert_eq!(upload.upload_id(), "up-1");
    assert_eq!(upload.issued_parts(), vec![1, 2, 3]);
    assert_eq!(upload.state(), UploadState::UrlIssued);

    let etag = uploader
        .upload_part(&ctx, &mut upload, 1, &b"aaa"[..], 3)
        .await
        .unwrap();
    assert_eq!(etag, "\"etag-1\"");
    uploader
        .upload_part(&ctx, &mut upload, 2, &b"bbb"[..], 3)
        .await
        .unwrap();

    let err = uploader
        .complete_multipart(&ctx, &serverless, &mut upload)
        .await
        .unwrap_err();
    match err {
        CoreError::IncompleteUpload { upload_id, missing } => {
            assert_eq!(upload_id, "up-1");
            assert_eq!(missing, vec![3]);
        }
        other => panic!("expected IncompleteUpload, got {other:?}"),
    }
    assert_eq!(upload.state(), UploadState::Uploading);

    uploader
        .upload_part(&ctx, &mut upload, 3, &b"ccc"[..], 3)
        .await
        .unwrap();
    uploader
        .complete_multipart(&ctx, &serverless, &mut upload)
        .await
        .unwrap();
    assert_eq!(upload.state(), UploadState::Uploaded);
}

#[tokio::test]
async fn test_multipart_cancel() {
    let server = MockServer::start().await;
    start_three_parts(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1beta1/clusters/c1/uploads/cancel"))
        .and(body_json(json!({"upload_id": "up-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = common::registry(&server);
    let serverless = registry.serverless().unwrap();
    let uploader = registry.uploader().unwrap();
    let ctx = CallContext::new();

    let mut upload = uploader
        .start_multipart(&ctx, &serverless, "c1", "big.csv", 9, 3)
        .await
        .unwrap();
    uploader
        .upload_part(&ctx, &mut upload, 1, &b"aaa"[..], 3)
        .await
        .unwrap();
    uploader
        .cancel_multipart(&ctx, &serverless, &mut upload)
        .await
        .unwrap();

    assert_eq!(upload.state(), UploadState::Failed);
    let err = uploader
        .upload_part(&ctx, &mut upload, 2, &b"bbb"[..], 3)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument(_)), "got {err:?}");
}

#[tokio::test]
async fn test_part_without_etag_fails_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta1/clusters/c1/uploads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_id": "up-2",
            "parts": [{"part_number": 1, "url": format!("{}/parts/bare", server.uri())}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/parts/bare"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let registry = common::registry(&server);
    let serverless = registry.serverless().unwrap();
    let uploader = registry.uploader().unwrap();
    let ctx = CallContext::new();

    let mut upload = uploader
        .start_multipart(&ctx, &serverless, "c1", "one.csv", 3, 1)
        .await
        .unwrap();
    let err = uploader
        .upload_part(&ctx, &mut upload, 1, &b"abc"[..], 3)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Decode(_)), "got {err:?}");
    assert_eq!(upload.state(), UploadState::Failed);
    assert_eq!(upload.missing_parts(), vec![1]);
}

#[tokio::test]
async fn test_zero_parts_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let registry = common::registry(&server);
    let serverless = registry.serverless().unwrap();
    let err = registry
        .uploader()
        .unwrap()
        .start_multipart(&CallContext::new(), &serverless, "c1", "x.csv", 0, 0)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidArgument(_)));
}
