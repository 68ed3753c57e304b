//! Health & readiness handlers.
//!
//! - `GET /` and `GET /health` -> liveness, routed through the dispatcher
//! - `GET /readyz` -> readiness that checks the metadata store and blob dir

use crate::{
    app_state::AppState,
    models::response::ApiResponse,
    services::{blob_store::BlobStore, metadata_store::MetadataStore},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// Liveness probe. Never touches a store.
pub fn health() -> ApiResponse {
    ApiResponse::json(
        StatusCode::OK,
        &HealthResponse {
            status: "ok".into(),
        },
    )
}

/// `GET /readyz`
///
/// 1. Runs `SELECT 1` against the metadata database.
/// 2. Performs a write/read/delete round trip in the bucket directory.
///
/// HTTP 200 when both pass, HTTP 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let metadata_check = match state.metadata.ping().await {
        Ok(()) => CheckStatus::ok(),
        Err(e) => CheckStatus::failed(format!("error: {}", e)),
    };
    let disk_check = match state.blobs.probe().await {
        Ok(()) => CheckStatus::ok(),
        Err(e) => CheckStatus::failed(format!("error: {}", e)),
    };

    let overall_ok = metadata_check.ok && disk_check.ok;
    let checks = HashMap::from([("metadata", metadata_check), ("disk", disk_check)]);

    let body = ReadyResponse {
        status: if overall_ok { "ok".into() } else { "error".into() },
        checks,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
