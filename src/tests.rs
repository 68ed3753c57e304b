//! End-to-end tests through the axum router with real stores: SQLite in
//! memory for metadata and a temp directory for blobs.

use crate::{
    app_state::AppState,
    handlers::gateway_handlers::{gateway, invoke},
    models::{file_record::MAX_UPLOAD_BYTES, response::ApiResponse},
    routes::routes::{INVOKE_PATH, routes},
    services::{
        blob_store::LocalBlobStore, metadata_store::SqliteMetadataStore, testing::memory_pool,
    },
};
use axum::{Router, extract::DefaultBodyLimit, http::StatusCode, routing::post};
use axum_test::TestServer;
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;

const PUBLIC_URL: &str = "http://files.test";

async fn test_state() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let blobs = LocalBlobStore::new(dir.path(), "uploads", PUBLIC_URL, "test-key").unwrap();
    let metadata = SqliteMetadataStore::new(memory_pool().await, "files");
    (AppState::new(blobs, metadata), dir)
}

async fn test_server() -> (TestServer, TempDir) {
    let (state, dir) = test_state().await;
    let app = routes().with_state(state);
    (TestServer::new(app).unwrap(), dir)
}

async fn upload(server: &TestServer, name: &str, content: &str) -> Value {
    let resp = server
        .post("/upload")
        .json(&json!({"file_name": name, "file_content": content}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    resp.json::<Value>()
}

/// Split a download URL into its path and `(name, value)` query pairs.
fn split_link(url: &str) -> (String, Vec<(String, String)>) {
    let rest = url.strip_prefix(PUBLIC_URL).unwrap();
    let (path, query) = rest.split_once('?').unwrap();
    let params = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    (path.to_string(), params)
}

#[tokio::test]
async fn test_should_report_health() {
    let (server, _dir) = test_server().await;
    for path in ["/", "/health"] {
        let resp = server.get(path).await;
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert_eq!(resp.header("content-type"), "application/json");
        assert_eq!(resp.json::<Value>(), json!({"status": "ok"}));
    }
}

#[tokio::test]
async fn test_should_upload_list_and_download() {
    let (server, _dir) = test_server().await;

    let created = upload(&server, "hello.txt", "Hello, files!").await;
    let file_id = created["file_id"].as_str().unwrap().to_string();
    assert_eq!(created["file_name"], "hello.txt");

    let listed = server.get("/files").await.json::<Value>();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["file_id"], file_id.as_str());
    assert_eq!(listed[0]["file_name"], "hello.txt");
    assert_eq!(listed[0]["size"], 13);
    assert_eq!(listed[0]["content_type"], "text/plain");

    let resp = server.get(&format!("/files/{}", file_id)).await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    let link = resp.json::<Value>();
    assert_eq!(link["file_name"], "hello.txt");

    let (path, params) = split_link(link["download_url"].as_str().unwrap());
    assert_eq!(path, format!("/blobs/uploads/{}_hello.txt", file_id));

    let mut request = server.get(&path);
    for (name, value) in &params {
        request = request.add_query_param(name, value);
    }
    let blob = request.await;
    assert_eq!(blob.status_code(), StatusCode::OK);
    assert_eq!(&blob.as_bytes()[..], b"Hello, files!");
    assert_eq!(blob.header("content-type"), "text/plain");
    assert_eq!(blob.header("x-amz-meta-file-id"), file_id.as_str());
    assert_eq!(blob.header("x-amz-meta-original-name"), "hello.txt");
}

#[tokio::test]
async fn test_should_serve_byte_array_uploads() {
    let (server, _dir) = test_server().await;
    let created = server
        .post("/upload")
        .json(&json!({
            "file_name": "raw.bin",
            "file_content": [0, 1, 254, 255],
            "content_type": "application/octet-stream"
        }))
        .await
        .json::<Value>();

    let link = server
        .get(&format!("/files/{}", created["file_id"].as_str().unwrap()))
        .await
        .json::<Value>();
    let (path, params) = split_link(link["download_url"].as_str().unwrap());
    let mut request = server.get(&path);
    for (name, value) in &params {
        request = request.add_query_param(name, value);
    }
    let blob = request.await;
    assert_eq!(&blob.as_bytes()[..], &[0u8, 1, 254, 255]);
    assert_eq!(blob.header("content-type"), "application/octet-stream");
}

#[tokio::test]
async fn test_should_reject_missing_name_without_writes() {
    let (server, dir) = test_server().await;

    let resp = server
        .post("/upload")
        .json(&json!({"file_content": "orphan?"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.json::<Value>(),
        json!({"error": "Provide file_name and file_content"})
    );

    assert_eq!(server.get("/files").await.json::<Value>(), json!([]));
    assert!(!dir.path().join("uploads").exists());
}

#[tokio::test]
async fn test_should_reject_oversized_upload_without_writes() {
    let (server, dir) = test_server().await;

    let resp = server
        .post("/upload")
        .json(&json!({
            "file_name": "big.txt",
            "file_content": "x".repeat(MAX_UPLOAD_BYTES + 1)
        }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(resp.json::<Value>(), json!({"error": "File too large (>20MB)"}));

    assert_eq!(server.get("/files").await.json::<Value>(), json!([]));
    assert!(!dir.path().join("uploads").exists());
}

#[tokio::test]
async fn test_should_list_empty_store() {
    let (server, _dir) = test_server().await;
    let resp = server.get("/files").await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(resp.json::<Value>(), json!([]));
}

#[tokio::test]
async fn test_should_list_newest_first() {
    let (server, _dir) = test_server().await;

    let mut ids = Vec::new();
    for name in ["t1.txt", "t2.txt", "t3.txt"] {
        ids.push(upload(&server, name, name).await["file_id"].clone());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let listed = server.get("/files").await.json::<Value>();
    let order: Vec<Value> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["file_id"].clone())
        .collect();
    ids.reverse();
    assert_eq!(order, ids);
}

#[tokio::test]
async fn test_should_return_not_found_for_unknown_file() {
    let (server, _dir) = test_server().await;
    let resp = server.get("/files/does-not-exist").await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>(), json!({"error": "File not found"}));
}

#[tokio::test]
async fn test_should_return_not_found_for_unknown_route() {
    let (server, _dir) = test_server().await;
    for resp in [
        server.get("/nope").await,
        server.put("/upload").await,
        server.delete("/files/abc").await,
    ] {
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(resp.json::<Value>(), json!({"error": "Not Found"}));
    }
}

#[tokio::test]
async fn test_should_refuse_tampered_or_unsigned_links() {
    let (server, _dir) = test_server().await;
    let created = upload(&server, "secret.txt", "top secret").await;
    let link = server
        .get(&format!("/files/{}", created["file_id"].as_str().unwrap()))
        .await
        .json::<Value>();
    let (path, params) = split_link(link["download_url"].as_str().unwrap());

    let mut request = server.get(&path);
    for (name, value) in &params {
        let value = if name == "signature" {
            "00".repeat(32)
        } else {
            value.clone()
        };
        request = request.add_query_param(name, value);
    }
    assert_eq!(request.await.status_code(), StatusCode::FORBIDDEN);

    assert_eq!(server.get(&path).await.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_should_accept_raw_invocation_events() {
    let (server, _dir) = test_server().await;

    let event = json!({
        "httpMethod": "POST",
        "path": "/upload",
        "body": r#"{"file_name": "v1.txt", "file_content": "rest api"}"#
    });
    let resp = server.post(INVOKE_PATH).json(&event).await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    let envelope = resp.json::<ApiResponse>();
    assert_eq!(envelope.status_code, 200);
    assert_eq!(envelope.headers["content-type"], "application/json");
    let created: Value = serde_json::from_str(&envelope.body).unwrap();
    assert_eq!(created["file_name"], "v1.txt");

    let event = json!({
        "version": "2.0",
        "rawPath": "/files",
        "requestContext": {"http": {"method": "GET"}}
    });
    let envelope = server.post(INVOKE_PATH).json(&event).await.json::<ApiResponse>();
    let listed: Value = serde_json::from_str(&envelope.body).unwrap();
    assert_eq!(listed[0]["file_name"], "v1.txt");

    let envelope = server
        .post(INVOKE_PATH)
        .text("not json")
        .await
        .json::<ApiResponse>();
    assert_eq!(envelope.status_code, 404);
}

#[tokio::test]
async fn test_should_report_ready() {
    let (server, _dir) = test_server().await;
    let resp = server.get("/readyz").await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    let body = resp.json::<Value>();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["metadata"]["ok"], true);
    assert_eq!(body["checks"]["disk"]["ok"], true);
}

#[tokio::test]
async fn test_should_accept_escaped_upload_under_cap() {
    let (server, _dir) = test_server().await;
    let content = "\u{1}".repeat(15 * 1024 * 1024);

    let resp = server
        .post("/upload")
        .json(&json!({"file_name": "control.bin", "file_content": content}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);

    let listed = server.get("/files").await.json::<Value>();
    assert_eq!(listed[0]["size"], 15 * 1024 * 1024);
}

#[tokio::test]
async fn test_should_answer_body_over_transport_limit_with_json_413() {
    let (state, _dir) = test_state().await;
    let app = Router::new()
        .route(INVOKE_PATH, post(invoke))
        .fallback(gateway)
        .layer(DefaultBodyLimit::max(64))
        .with_state(state);
    let server = TestServer::new(app).unwrap();
    let body = json!({"file_name": "big.txt", "file_content": "x".repeat(1024)});

    let resp = server.post("/upload").json(&body).await;
    assert_eq!(resp.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(resp.header("content-type"), "application/json");
    assert_eq!(resp.json::<Value>(), json!({"error": "File too large (>20MB)"}));

    let event = json!({"httpMethod": "POST", "path": "/upload", "body": body.to_string()});
    let resp = server.post(INVOKE_PATH).json(&event).await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    let envelope = resp.json::<ApiResponse>();
    assert_eq!(envelope.status_code, 413);
    assert_eq!(envelope.body, r#"{"error":"File too large (>20MB)"}"#);
}

#[tokio::test]
async fn test_should_answer_wrong_method_on_http_routes_with_json_404() {
    let (server, _dir) = test_server().await;
    for resp in [
        server.post("/readyz").await,
        server.get(INVOKE_PATH).await,
        server.post("/blobs/uploads/some-key").await,
    ] {
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(resp.header("content-type"), "application/json");
        assert_eq!(resp.json::<Value>(), json!({"error": "Not Found"}));
    }
}
