use crate::services::{
    blob_store::LocalBlobStore, file_service::FileService, metadata_store::SqliteMetadataStore,
};
use std::sync::Arc;

/// Shared state handed to every axum handler.
///
/// `files` is what the routed operations use; the concrete stores are kept
/// alongside for the blob data plane and readiness probe.
#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    pub blobs: Arc<LocalBlobStore>,
    pub metadata: Arc<SqliteMetadataStore>,
}

impl AppState {
    pub fn new(blobs: LocalBlobStore, metadata: SqliteMetadataStore) -> Self {
        let blobs = Arc::new(blobs);
        let metadata = Arc::new(metadata);
        Self {
            files: FileService::new(blobs.clone(), metadata.clone()),
            blobs,
            metadata,
        }
    }
}
