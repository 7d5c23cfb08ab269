//! HTTP surface tests driven through the router without a listener

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use filestore::config::Config;
use filestore::db::Database;
use filestore::storage::LocalBlobStore;
use filestore::{create_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const OWNER_HEADER: &str = "x-filestore-user";
const BOUNDARY: &str = "filestore-test-boundary";
const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

async fn create_app() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("filestore.db");
    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
    db.run_migrations().await.unwrap();

    let state = AppState {
        db,
        config: Arc::new(Config::default()),
        store: Arc::new(LocalBlobStore::new(temp_dir.path().join("blobs"))),
    };
    (create_router(state), temp_dir)
}

fn upload_request(owner: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n").as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/files/upload")
        .header(OWNER_HEADER, owner)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn request(method: Method, uri: &str, owner: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(OWNER_HEADER, owner)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_needs_no_identity() {
    let (app, _temp) = create_app().await;

    let req = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
    let (status, json) = send_json(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["storage"], "local");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let (app, _temp) = create_app().await;

    let req = Request::builder().uri("/api/v1/files").body(Body::empty()).unwrap();
    let (status, json) = send_json(&app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], 401);
}

#[tokio::test]
async fn test_upload_list_and_download() {
    let (app, _temp) = create_app().await;

    let (status, json) = send_json(&app, upload_request("alice", "../secret/a.txt", b"hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["hash"], HELLO_SHA1);
    assert_eq!(json["data"]["name"], "a.txt");
    assert_eq!(json["data"]["size"], 5);

    let (status, json) = send_json(&app, request(Method::GET, "/api/v1/files?limit=0&offset=-3", "alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["limit"], 10);
    assert_eq!(json["data"]["offset"], 0);
    assert_eq!(json["data"]["files"][0]["name"], "a.txt");

    let uri = format!("/api/v1/files/{}/download", HELLO_SHA1.to_uppercase());
    let response = app.clone().oneshot(request(Method::GET, &uri, "alice")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("filename=\"a.txt\""));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"hello");
}

#[tokio::test]
async fn test_files_are_private_to_their_owner() {
    let (app, _temp) = create_app().await;
    send(&app, upload_request("alice", "a.txt", b"hello")).await;

    let uri = format!("/api/v1/files/{HELLO_SHA1}");
    let (status, _) = send(&app, request(Method::GET, &uri, "bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request(Method::DELETE, &uri, "bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send_json(&app, request(Method::GET, &uri, "alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "a.txt");
}

#[tokio::test]
async fn test_rename_then_delete() {
    let (app, _temp) = create_app().await;
    send(&app, upload_request("alice", "a.txt", b"hello")).await;
    let uri = format!("/api/v1/files/{HELLO_SHA1}");

    let rename = Request::builder()
        .method(Method::PATCH)
        .uri(&uri)
        .header(OWNER_HEADER, "alice")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"renamed.txt"}"#))
        .unwrap();
    let (status, json) = send_json(&app, rename).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "renamed.txt");

    let (status, json) = send_json(&app, request(Method::DELETE, &uri, "alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 0);

    let (status, _) = send(&app, request(Method::GET, &uri, "alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, request(Method::DELETE, &uri, "alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_hash_is_bad_request() {
    let (app, _temp) = create_app().await;

    for uri in ["/api/v1/files/not-a-hash", "/api/v1/files/abc123/download"] {
        let (status, json) = send_json(&app, request(Method::GET, uri, "alice")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], 400);
    }
}

#[tokio::test]
async fn test_upload_without_file_field_is_rejected() {
    let (app, _temp) = create_app().await;

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
    );
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/files/upload")
        .header(OWNER_HEADER, "alice")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();

    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_larger_than_default_body_limit() {
    let (app, _temp) = create_app().await;

    // 3 MiB, past axum's 2 MB default request body limit
    let content: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let expected = {
        use sha1::{Digest, Sha1};
        hex::encode(Sha1::digest(&content))
    };

    let (status, json) = send_json(&app, upload_request("alice", "big.bin", &content)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["hash"], expected.as_str());
    assert_eq!(json["data"]["size"], content.len() as u64);

    let uri = format!("/api/v1/files/{expected}/download");
    let response = app.clone().oneshot(request(Method::GET, &uri, "alice")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH].to_str().unwrap(),
        content.len().to_string()
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), content.len());
    assert!(body[..] == content[..]);
}
