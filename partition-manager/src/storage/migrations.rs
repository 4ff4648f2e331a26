//! Metadata schema migrations
//!
//! Creates the TimescaleDB extension and the master-database tables the
//! resolver depends on. Every statement is idempotent.

use sqlx::PgPool;
use tracing::{debug, info, warn};

use super::{RepositoryResult, PARTITION_MAP_TABLE, SYSTEM_CONFIG_TABLE};

/// Master database migrations
pub struct MetadataMigrations {
    pool: PgPool,
}

impl MetadataMigrations {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn run(&self) -> RepositoryResult<()> {
        info!("Running partition metadata migrations...");

        // Collections are hypertables; the metadata tables are plain tables
        let result = sqlx::query("CREATE EXTENSION IF NOT EXISTS timescaledb CASCADE")
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => debug!("TimescaleDB extension available"),
            Err(e) => warn!("Could not enable TimescaleDB extension: {}", e),
        }

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {PARTITION_MAP_TABLE} (
                id BIGSERIAL PRIMARY KEY,
                instrument VARCHAR(32) NOT NULL,
                resolution VARCHAR(16) NOT NULL,
                collection_name VARCHAR(63) NOT NULL,
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ NOT NULL,
                storage_backend VARCHAR(32) NOT NULL,
                status VARCHAR(16) NOT NULL DEFAULT 'active',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CHECK (start_date <= end_date)
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        // At most one active partition may start on a given day
        sqlx::query(&format!(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS uq_{PARTITION_MAP_TABLE}_active_start
            ON {PARTITION_MAP_TABLE} (instrument, resolution, start_date)
            WHERE status = 'active'
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE INDEX IF NOT EXISTS idx_{PARTITION_MAP_TABLE}_end
            ON {PARTITION_MAP_TABLE} (instrument, resolution, end_date DESC)
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {SYSTEM_CONFIG_TABLE} (
                id VARCHAR(64) PRIMARY KEY,
                status VARCHAR(16) NOT NULL DEFAULT 'active',
                document JSONB NOT NULL DEFAULT '{{}}',
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        info!("Partition metadata migrations completed");
        Ok(())
    }
}
