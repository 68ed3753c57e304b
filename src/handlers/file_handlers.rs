//! Handlers for the three file routes.
//!
//! Each takes the already-normalized request pieces, calls [`FileService`]
//! and renders the outcome as an [`ApiResponse`].

use crate::{
    models::{file_record::UploadRequest, response::ApiResponse},
    services::file_service::FileService,
};
use axum::http::StatusCode;
use serde_json::{Map, Value};

/// `POST /upload` with body `{file_name, file_content, content_type?}`.
pub async fn upload_file(service: &FileService, body: &Map<String, Value>) -> ApiResponse {
    let req = match UploadRequest::from_body(body) {
        Ok(req) => req,
        Err(err) => return err.into(),
    };

    match service.upload(req).await {
        Ok(created) => ApiResponse::json(StatusCode::OK, &created),
        Err(err) => err.into(),
    }
}

/// `GET /files`
pub async fn list_files(service: &FileService) -> ApiResponse {
    match service.list().await {
        Ok(records) => ApiResponse::json(StatusCode::OK, &records),
        Err(err) => err.into(),
    }
}

/// `GET /files/{file_id}` where `file_id` is already percent-decoded.
pub async fn download_file(service: &FileService, file_id: &str) -> ApiResponse {
    match service.download_link(file_id).await {
        Ok(link) => ApiResponse::json(StatusCode::OK, &link),
        Err(err) => err.into(),
    }
}
