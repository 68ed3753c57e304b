//! Inbound invocation events and their normalization.
//!
//! Two event layouts reach the service:
//! - **HTTP API (v2)**: `requestContext.http.method` + `rawPath`
//! - **REST API (v1)**: top-level `httpMethod` + `path`
//!
//! Both collapse into one [`InboundRequest`] before routing. Normalization
//! never fails: anything missing becomes an empty string or empty body.

use base64::{Engine as _, engine::general_purpose};
use serde_json::{Map, Value};

/// Which event layout a request arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventShape {
    HttpApiV2,
    RestApiV1,
}

/// Method, path and raw body extracted from an invocation event.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub shape: EventShape,
    pub method: String,
    pub path: String,
    body: Option<String>,
    is_base64_encoded: bool,
}

impl InboundRequest {
    /// Normalize an event document of either shape.
    pub fn from_event(event: &Value) -> Self {
        let http = event
            .get("requestContext")
            .and_then(|rc| rc.get("http"))
            .filter(|http| http.is_object() && http.get("method").is_some());

        let (shape, method, path) = match http {
            Some(http) => (
                EventShape::HttpApiV2,
                string_field(http, "method"),
                string_field(event, "rawPath"),
            ),
            None => (
                EventShape::RestApiV1,
                string_field(event, "httpMethod"),
                string_field(event, "path"),
            ),
        };

        Self {
            shape,
            method,
            path,
            body: event.get("body").and_then(Value::as_str).map(str::to_string),
            is_base64_encoded: event
                .get("isBase64Encoded")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// Decode the body as a JSON object.
    ///
    /// Returns an empty map when the body is absent, is not valid base64 (for
    /// encoded bodies), is not valid JSON, or is JSON but not an object.
    pub fn parse_body(&self) -> Map<String, Value> {
        let Some(raw) = self.body.as_deref() else {
            return Map::new();
        };

        let parsed = if self.is_base64_encoded {
            general_purpose::STANDARD
                .decode(raw)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        } else {
            serde_json::from_str::<Value>(raw).ok()
        };

        match parsed {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
