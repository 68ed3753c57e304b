//! The response envelope returned for every invocation.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Status code, headers and a JSON-encoded body.
///
/// Serializes in the function-runtime shape:
/// `{"statusCode": 200, "headers": {...}, "body": "..."}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    /// Wrap `data` as a JSON response with the default content type.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, data: &T) -> Self {
        Self::json_with_headers(status, data, BTreeMap::new())
    }

    /// Like [`ApiResponse::json`], merging `extra` over the default headers.
    pub fn json_with_headers<T: Serialize + ?Sized>(
        status: StatusCode,
        data: &T,
        extra: BTreeMap<String, String>,
    ) -> Self {
        let mut headers = BTreeMap::from([(
            "content-type".to_string(),
            JSON_CONTENT_TYPE.to_string(),
        )]);
        headers.extend(extra);

        // Serializing plain data structs and `serde_json::Value` cannot fail.
        let body = serde_json::to_string(data).unwrap_or_else(|_| "null".into());

        Self {
            status_code: status.as_u16(),
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}
