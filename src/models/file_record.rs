//! File metadata and the request/response bodies of the file routes.

use crate::{
    errors::ApiError,
    models::attribute::{AttrValue, Item},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Largest accepted upload: 20 MiB.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Metadata for one uploaded file.
///
/// The blob holding the bytes is addressed by [`FileRecord::blob_key`], which
/// is derived from `file_id` and `file_name` rather than stored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileRecord {
    /// Random v4 UUID assigned at upload time.
    pub file_id: String,

    /// Original name supplied by the client.
    pub file_name: String,

    /// Byte length of the stored content.
    pub size: u64,

    /// RFC 3339 UTC timestamp with microseconds, e.g. `2025-01-01T12:00:00.000000+00:00`.
    pub upload_timestamp: String,

    /// MIME type supplied by the client.
    pub content_type: String,
}

impl FileRecord {
    pub fn new(
        file_id: Uuid,
        file_name: String,
        size: u64,
        uploaded_at: DateTime<Utc>,
        content_type: String,
    ) -> Self {
        Self {
            file_id: file_id.to_string(),
            file_name,
            size,
            upload_timestamp: format_timestamp(uploaded_at),
            content_type,
        }
    }

    pub fn blob_key(&self) -> String {
        blob_key(&self.file_id, &self.file_name)
    }

    pub fn into_item(self) -> Item {
        Item::from([
            ("file_id".to_string(), AttrValue::S(self.file_id)),
            ("file_name".to_string(), AttrValue::S(self.file_name)),
            ("size".to_string(), AttrValue::from(self.size)),
            (
                "upload_timestamp".to_string(),
                AttrValue::S(self.upload_timestamp),
            ),
            ("content_type".to_string(), AttrValue::S(self.content_type)),
        ])
    }
}

/// Storage key for a file's blob: `{file_id}_{file_name}`.
pub fn blob_key(file_id: &str, file_name: &str) -> String {
    format!("{}_{}", file_id, file_name)
}

/// Fixed-width RFC 3339 so lexicographic order matches chronological order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// File body as sent by the client: text or an array of byte values.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum FileContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContent {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }
}

/// Body of `POST /upload`, validated.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

impl UploadRequest {
    /// Validate a parsed request body.
    ///
    /// `file_name` must be a non-empty string and `file_content` must be
    /// present and non-null (an empty string is valid content). A missing,
    /// empty, or non-string `content_type` falls back to `text/plain`.
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, ApiError> {
        let file_name = body
            .get("file_name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or(ApiError::Validation)?;

        let content = match body.get("file_content") {
            None | Some(Value::Null) => return Err(ApiError::Validation),
            Some(value) => FileContent::deserialize(value).map_err(|_| ApiError::Validation)?,
        };

        let data = content.into_bytes();
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::PayloadTooLarge);
        }

        let content_type = body
            .get("content_type")
            .and_then(Value::as_str)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        Ok(Self {
            file_name: file_name.to_string(),
            data,
            content_type: content_type.to_string(),
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub file_id: String,
    pub file_name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DownloadResponse {
    pub file_id: String,
    pub file_name: String,
    pub download_url: String,
}
