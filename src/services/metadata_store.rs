//! Keyed record store for file metadata.
//!
//! [`MetadataStore`] is the contract the upload/list/download paths depend
//! on: put one item, get one item by `file_id`, scan all items.
//! [`SqliteMetadataStore`] implements it on SQLite, keeping each item as
//! typed JSON so numbers round-trip as decimals.

use crate::models::attribute::{AttrValue, Item};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataStoreError {
    #[error("item is missing string key attribute `file_id`")]
    MissingKey,
    #[error("stored item for `{0}` is corrupt: {1}")]
    Corrupt(String, serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type MetadataResult<T> = Result<T, MetadataStoreError>;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or replace the item keyed by its `file_id` attribute.
    async fn put_item(&self, item: Item) -> MetadataResult<()>;

    /// Fetch one item by `file_id`.
    async fn get_item(&self, file_id: &str) -> MetadataResult<Option<Item>>;

    /// Return every item. Order is unspecified.
    async fn scan(&self) -> MetadataResult<Vec<Item>>;

    /// Cheap connectivity check used by readiness probes.
    async fn ping(&self) -> MetadataResult<()>;
}

/// SQLite-backed store scoped to one logical table.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    pub db: Arc<SqlitePool>,
    pub table_name: String,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>, table_name: impl Into<String>) -> Self {
        Self {
            db,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn put_item(&self, item: Item) -> MetadataResult<()> {
        let file_id = item
            .get("file_id")
            .and_then(AttrValue::as_s)
            .ok_or(MetadataStoreError::MissingKey)?
            .to_string();
        let encoded = serde_json::to_string(&item)?;

        sqlx::query(
            r#"
            INSERT INTO file_records (table_name, file_id, item, written_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(table_name, file_id) DO UPDATE SET
                item = excluded.item,
                written_at = excluded.written_at
            "#,
        )
        .bind(&self.table_name)
        .bind(&file_id)
        .bind(encoded)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        Ok(())
    }

    async fn get_item(&self, file_id: &str) -> MetadataResult<Option<Item>> {
        let row: Option<String> = sqlx::query_scalar(
            "SELECT item FROM file_records WHERE table_name = ? AND file_id = ?",
        )
        .bind(&self.table_name)
        .bind(file_id)
        .fetch_optional(&*self.db)
        .await?;

        row.map(|raw| decode_item(file_id, &raw)).transpose()
    }

    async fn scan(&self) -> MetadataResult<Vec<Item>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT file_id, item FROM file_records WHERE table_name = ?")
                .bind(&self.table_name)
                .fetch_all(&*self.db)
                .await?;

        rows.iter()
            .map(|(file_id, raw)| decode_item(file_id, raw))
            .collect()
    }

    async fn ping(&self) -> MetadataResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

fn decode_item(file_id: &str, raw: &str) -> MetadataResult<Item> {
    serde_json::from_str(raw).map_err(|err| MetadataStoreError::Corrupt(file_id.to_string(), err))
}

/// Create the metadata schema if it does not exist yet.
pub async fn run_migrations(db: &SqlitePool) -> anyhow::Result<()> {
    let sql = include_str!("../../migrations/0001_init.sql");
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
