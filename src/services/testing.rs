//! In-memory store fakes and fixtures shared by unit tests.

use crate::services::{
    blob_store::{BlobResult, BlobStore, BlobStoreError},
    metadata_store::{MetadataResult, MetadataStore, MetadataStoreError, run_migrations},
};
use crate::models::attribute::{AttrValue, Item};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{
    collections::{BTreeMap, HashMap},
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Single-connection in-memory SQLite with the schema applied.
pub async fn memory_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(pool)
}

#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub body: Bytes,
    pub content_type: String,
    pub tags: BTreeMap<String, String>,
}

/// Blob store keeping objects in a map. `failing()` errors on every call.
#[derive(Default)]
pub struct FakeBlobStore {
    objects: Mutex<HashMap<String, StoredBlob>>,
    fail: bool,
}

impl FakeBlobStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    fn check(&self) -> BlobResult<()> {
        if self.fail {
            return Err(BlobStoreError::Io(io::Error::other("blob store unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        tags: BTreeMap<String, String>,
    ) -> BlobResult<()> {
        self.check()?;
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredBlob {
                body,
                content_type: content_type.to_string(),
                tags,
            },
        );
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<String> {
        self.check()?;
        Ok(format!("fake://{}?ttl={}", key, expires_in.as_secs()))
    }

    async fn probe(&self) -> BlobResult<()> {
        self.check()
    }
}

/// Metadata store keeping items in a map. `failing()` errors on every call.
#[derive(Default)]
pub struct FakeMetadataStore {
    items: Mutex<HashMap<String, Item>>,
    fail: bool,
}

impl FakeMetadataStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Insert directly, bypassing `fail`.
    pub fn insert(&self, item: Item) {
        let id = item
            .get("file_id")
            .and_then(AttrValue::as_s)
            .unwrap_or_default()
            .to_string();
        self.items.lock().unwrap().insert(id, item);
    }

    pub fn get(&self, file_id: &str) -> Option<Item> {
        self.items.lock().unwrap().get(file_id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    fn check(&self) -> MetadataResult<()> {
        if self.fail {
            return Err(MetadataStoreError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for FakeMetadataStore {
    async fn put_item(&self, item: Item) -> MetadataResult<()> {
        self.check()?;
        if item.get("file_id").and_then(AttrValue::as_s).is_none() {
            return Err(MetadataStoreError::MissingKey);
        }
        self.insert(item);
        Ok(())
    }

    async fn get_item(&self, file_id: &str) -> MetadataResult<Option<Item>> {
        self.check()?;
        Ok(self.get(file_id))
    }

    async fn scan(&self) -> MetadataResult<Vec<Item>> {
        self.check()?;
        Ok(self.items.lock().unwrap().values().cloned().collect())
    }

    async fn ping(&self) -> MetadataResult<()> {
        self.check()
    }
}
