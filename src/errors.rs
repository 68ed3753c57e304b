use crate::models::response::ApiResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Every failure a route can report to the client.
///
/// The `Display` text is the exact `error` string placed in the response
/// body. Store failures carry the underlying error's text as detail.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Provide file_name and file_content")]
    Validation,
    #[error("File too large (>20MB)")]
    PayloadTooLarge,
    #[error("File not found")]
    NotFound,
    #[error("Not Found")]
    RouteNotFound,
    #[error("S3 upload failed: {0}")]
    StorageWrite(String),
    #[error("DynamoDB write failed: {0}")]
    MetadataWrite(String),
    #[error("DynamoDB scan failed: {0}")]
    MetadataScan(String),
    #[error("DynamoDB read failed: {0}")]
    MetadataRead(String),
    #[error("Could not generate download URL: {0}")]
    Presign(String),
    #[error("Invalid download link")]
    Forbidden,
    #[error("Download link expired")]
    Expired,
    #[error("Could not read stored file: {0}")]
    StorageRead(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound | Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::Forbidden | Self::Expired => StatusCode::FORBIDDEN,
            Self::StorageWrite(_)
            | Self::MetadataWrite(_)
            | Self::MetadataScan(_)
            | Self::MetadataRead(_)
            | Self::Presign(_)
            | Self::StorageRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as `{"error": "<message>"}` with the matching status.
    pub fn to_response(&self) -> ApiResponse {
        ApiResponse::json(self.status(), &json!({ "error": self.to_string() }))
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        err.to_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.to_response().into_response()
    }
}
