//! Request routing.
//!
//! ## Function routes (dispatched from a normalized event)
//! - `GET  /` and `GET /health` -> liveness
//! - `POST /upload`             -> store a file
//! - `GET  /files`              -> list metadata, newest first
//! - `GET  /files/{file_id}`    -> pre-signed download link
//! - anything else              -> 404 `{"error": "Not Found"}`
//!
//! ## HTTP-only routes (axum)
//! - `GET  /readyz`                                       -> readiness
//! - `GET  /blobs/{bucket}/{*key}`                        -> pre-signed link target
//! - `POST /2015-03-31/functions/function/invocations`    -> raw event invocation

use crate::{
    app_state::AppState,
    errors::ApiError,
    handlers::{
        file_handlers::{download_file, list_files, upload_file},
        gateway_handlers::{gateway, get_blob, invoke},
        health_handlers::{health, readyz},
    },
    models::{event::InboundRequest, file_record::MAX_UPLOAD_BYTES, response::ApiResponse},
    services::file_service::FileService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use percent_encoding::percent_decode_str;
use serde_json::Value;
use tracing::info;

pub const INVOKE_PATH: &str = "/2015-03-31/functions/function/invocations";

/// A full-size upload can take up to six request characters per content
/// byte as an escaped JSON string (`\u0001`), and seven once an invocation
/// event nests that body inside another string.
const MAX_REQUEST_BYTES: usize = 7 * MAX_UPLOAD_BYTES + 64 * 1024;

const FILES_PREFIX: &str = "/files/";

/// Route one invocation event to its handler.
pub async fn dispatch(files: &FileService, event: &Value) -> ApiResponse {
    info!("EVENT: {}", event);

    let req = InboundRequest::from_event(event);
    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/" | "/health") => health(),
        ("POST", "/upload") => upload_file(files, &req.parse_body()).await,
        ("GET", "/files") => list_files(files).await,
        ("GET", path) if path.starts_with(FILES_PREFIX) => {
            let file_id = percent_decode_str(&path[FILES_PREFIX.len()..]).decode_utf8_lossy();
            download_file(files, &file_id).await
        }
        _ => ApiError::RouteNotFound.into(),
    }
}

/// Build the axum router. Everything not matched explicitly, including a
/// wrong method on a matched path, falls through to the event dispatcher.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/readyz", get(readyz))
        .route("/blobs/{bucket}/{*key}", get(get_blob))
        .route(INVOKE_PATH, post(invoke))
        .fallback(gateway)
        .method_not_allowed_fallback(gateway)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
}
