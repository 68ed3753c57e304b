//! FileService: upload, list and download-link operations.
//!
//! Bytes go to a [`BlobStore`], descriptive metadata to a [`MetadataStore`].
//! The only link between the two is the derived key `{file_id}_{file_name}`.
//!
//! Uploads are not transactional: the blob is written first, and if the
//! metadata write then fails the blob is left in place without a record.

use crate::{
    errors::ApiError,
    models::{
        attribute::Item,
        file_record::{DownloadResponse, FileRecord, UploadRequest, UploadResponse, blob_key},
    },
    services::{blob_store::BlobStore, metadata_store::MetadataStore, numeric},
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use std::{cmp::Ordering, collections::BTreeMap, sync::Arc, time::Duration};
use tracing::{error, info};
use uuid::Uuid;

/// Lifetime of a download link.
pub const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct FileService {
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl FileService {
    pub fn new(blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { blobs, metadata }
    }

    /// Store a validated upload and record its metadata.
    pub async fn upload(&self, req: UploadRequest) -> Result<UploadResponse, ApiError> {
        let file_id = Uuid::new_v4();
        let size = req.data.len() as u64;
        let key = blob_key(&file_id.to_string(), &req.file_name);

        let tags = BTreeMap::from([
            ("file-id".to_string(), file_id.to_string()),
            ("original-name".to_string(), req.file_name.clone()),
        ]);

        if let Err(err) = self
            .blobs
            .put_object(&key, Bytes::from(req.data), &req.content_type, tags)
            .await
        {
            error!(%file_id, key = %key, error = %err, "blob put_object failed");
            return Err(ApiError::StorageWrite(err.to_string()));
        }

        let record = FileRecord::new(file_id, req.file_name, size, Utc::now(), req.content_type);
        let response = UploadResponse {
            file_id: record.file_id.clone(),
            file_name: record.file_name.clone(),
        };

        if let Err(err) = self.metadata.put_item(record.into_item()).await {
            error!(
                %file_id,
                key = %key,
                error = %err,
                "metadata put_item failed; blob left orphaned"
            );
            return Err(ApiError::MetadataWrite(err.to_string()));
        }

        info!(%file_id, size, "file uploaded");
        Ok(response)
    }

    /// Every record, newest `upload_timestamp` first.
    pub async fn list(&self) -> Result<Vec<Value>, ApiError> {
        let items = self.metadata.scan().await.map_err(|err| {
            error!(error = %err, "metadata scan failed");
            ApiError::MetadataScan(err.to_string())
        })?;

        let mut records = numeric::normalize_items(&items);
        records.sort_by(|a, b| newest_first(a, b));
        Ok(records)
    }

    /// Resolve `file_id` to a time-limited download link.
    pub async fn download_link(&self, file_id: &str) -> Result<DownloadResponse, ApiError> {
        let item = self
            .metadata
            .get_item(file_id)
            .await
            .map_err(|err| {
                error!(file_id, error = %err, "metadata get_item failed");
                ApiError::MetadataRead(err.to_string())
            })?
            .ok_or(ApiError::NotFound)?;

        let file_name = stored_file_name(&item).ok_or_else(|| {
            error!(file_id, "stored record has no file_name");
            ApiError::MetadataRead(format!("record `{}` has no file_name", file_id))
        })?;

        let key = blob_key(file_id, &file_name);
        let download_url = self
            .blobs
            .presign_get(&key, DOWNLOAD_URL_TTL)
            .await
            .map_err(|err| {
                error!(file_id, key = %key, error = %err, "presign failed");
                ApiError::Presign(err.to_string())
            })?;

        Ok(DownloadResponse {
            file_id: file_id.to_string(),
            file_name,
            download_url,
        })
    }
}

fn stored_file_name(item: &Item) -> Option<String> {
    match numeric::normalize_item(item).get("file_name") {
        Some(Value::String(name)) => Some(name.clone()),
        _ => None,
    }
}

/// Descending by `upload_timestamp`; a missing or non-string stamp counts as "".
fn newest_first(a: &Value, b: &Value) -> Ordering {
    let stamp = |v: &Value| {
        v.get("upload_timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    stamp(b).cmp(&stamp(a))
}
