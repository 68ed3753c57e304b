//! HTTP front door.
//!
//! - any unmatched request -> converted to an HTTP API v2 event and dispatched
//! - `POST /2015-03-31/functions/function/invocations` -> raw event in,
//!   response envelope out
//! - `GET /blobs/{bucket}/{*key}` -> serves pre-signed download links

use crate::{
    app_state::AppState,
    errors::ApiError,
    models::response::ApiResponse,
    routes::routes::dispatch,
    services::blob_store::BlobStoreError,
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, Query, State, rejection::BytesRejection},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::Response,
};
use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio_util::io::ReaderStream;
use tracing::warn;

/// Query string of a pre-signed download link.
#[derive(Debug, Deserialize)]
pub struct SignedLinkQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

/// Fallback: every request not claimed by another route, and every
/// method a claimed route does not serve.
pub async fn gateway(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    let body = match buffered_body(body) {
        Ok(body) => body,
        Err(err) => return err.into(),
    };
    let event = http_api_event(&method, &uri, &headers, &body);
    dispatch(&state.files, &event).await
}

/// Invoke the function directly with an event document of either shape.
///
/// The HTTP status is always 200; the outcome lives in the envelope's
/// `statusCode`. A body that is not JSON is treated as an empty event.
pub async fn invoke(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Json<ApiResponse> {
    let body = match buffered_body(body) {
        Ok(body) => body,
        Err(err) => return Json(err.into()),
    };
    let event = serde_json::from_slice::<Value>(&body).unwrap_or_else(|err| {
        warn!(error = %err, "invocation payload is not JSON");
        Value::Null
    });
    Json(dispatch(&state.files, &event).await)
}

/// A body over the transport limit is reported as an oversized upload.
/// Any other read failure leaves the body empty.
fn buffered_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, ApiError> {
    match body {
        Ok(body) => Ok(body),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!(error = %rejection, "request body over transport limit");
            Err(ApiError::PayloadTooLarge)
        }
        Err(rejection) => {
            warn!(error = %rejection, "could not read request body");
            Ok(Bytes::new())
        }
    }
}

/// Serve the object behind a pre-signed link.
pub async fn get_blob(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<SignedLinkQuery>,
) -> Result<Response, ApiError> {
    let (Some(expires), Some(signature)) = (q.expires, q.signature) else {
        return Err(ApiError::Forbidden);
    };

    let (meta, file) = state
        .blobs
        .open_signed(&bucket, &key, expires, &signature)
        .await
        .map_err(|err| match err {
            BlobStoreError::SignatureMismatch | BlobStoreError::InvalidObjectKey => {
                ApiError::Forbidden
            }
            BlobStoreError::Expired => ApiError::Expired,
            BlobStoreError::ObjectNotFound { .. } => ApiError::NotFound,
            other => {
                tracing::error!(bucket = %bucket, key = %key, error = %other, "blob read failed");
                ApiError::StorageRead(other.to_string())
            }
        })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes));
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.etag)) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    for (tag, value) in &meta.tags {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(format!("x-amz-meta-{}", tag).as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    Ok(response)
}

/// Build the HTTP API v2 event for an inbound request.
///
/// UTF-8 bodies are passed as text, anything else base64 encoded with
/// `isBase64Encoded: true`. An empty body is omitted.
pub fn http_api_event(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Value {
    let mut header_map = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        header_map.insert(name.as_str().to_string(), Value::String(joined));
    }

    let mut event = json!({
        "version": "2.0",
        "rawPath": uri.path(),
        "rawQueryString": uri.query().unwrap_or_default(),
        "headers": header_map,
        "requestContext": {
            "http": {
                "method": method.as_str(),
                "path": uri.path(),
            }
        },
        "isBase64Encoded": false,
    });

    if !body.is_empty() {
        let (encoded, is_base64) = match std::str::from_utf8(body) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (general_purpose::STANDARD.encode(body), true),
        };
        event["body"] = Value::String(encoded);
        event["isBase64Encoded"] = Value::Bool(is_base64);
    }

    event
}
