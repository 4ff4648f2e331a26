//! Configuration document stores

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::info;

use super::{RepositoryError, RepositoryResult, SYSTEM_CONFIG_TABLE};
use crate::resolver::{ConfigDocument, PartitioningConfigSource};

/// `system_config` table on the master database
pub struct PgSystemConfigStore {
    pool: PgPool,
}

impl PgSystemConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the document stored under `id`
    pub async fn upsert(&self, id: &str, document: &ConfigDocument) -> RepositoryResult<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {SYSTEM_CONFIG_TABLE} (id, status, document, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                document = EXCLUDED.document,
                updated_at = NOW()
            "#
        ))
        .bind(id)
        .bind(&document.status)
        .bind(&document.body)
        .execute(&self.pool)
        .await?;

        info!("Stored configuration document '{}' ({})", id, document.status);
        Ok(())
    }
}

#[async_trait]
impl PartitioningConfigSource for PgSystemConfigStore {
    async fn fetch(&self, id: &str) -> RepositoryResult<Option<ConfigDocument>> {
        let row = sqlx::query(&format!(
            "SELECT status, document FROM {SYSTEM_CONFIG_TABLE} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ConfigDocument {
                status: row.try_get("status")?,
                body: row.try_get("document")?,
            })),
            None => Ok(None),
        }
    }
}

/// Process-local document store
#[derive(Default)]
pub struct InMemorySystemConfigStore {
    documents: Mutex<HashMap<String, ConfigDocument>>,
    fetches: AtomicUsize,
    fail: AtomicBool,
}

impl InMemorySystemConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(id: &str, document: ConfigDocument) -> Self {
        let store = Self::new();
        store.put(id, document);
        store
    }

    pub fn put(&self, id: &str, document: ConfigDocument) {
        self.documents.lock().insert(id.to_string(), document);
    }

    pub fn remove(&self, id: &str) -> Option<ConfigDocument> {
        self.documents.lock().remove(id)
    }

    /// Number of `fetch` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make every fetch fail with `RepositoryError::Unavailable`
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PartitioningConfigSource for InMemorySystemConfigStore {
    async fn fetch(&self, id: &str) -> RepositoryResult<Option<ConfigDocument>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("injected config failure".into()));
        }
        Ok(self.documents.lock().get(id).cloned())
    }
}
