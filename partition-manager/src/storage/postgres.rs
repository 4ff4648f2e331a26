//! PostgreSQL/TimescaleDB partition repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::catalog::{qualified_name, quote_ident, validate_identifier, InstrumentRouter};
use super::{
    CollectionProvisioning, InsertOutcome, PartitionRepository, RepositoryError,
    RepositoryResult, TimeSeriesOptions, PARTITION_MAP_TABLE,
};
use crate::config::DatabaseSettings;
use crate::partition::{PartitionRecord, PartitionStatus};

const RECORD_COLUMNS: &str = "instrument, resolution, collection_name, start_date, end_date, \
                              storage_backend, status, created_at, updated_at";

/// Open the master database pool
pub async fn connect_pool(settings: &DatabaseSettings) -> RepositoryResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect(&settings.url)
        .await?;

    Ok(pool)
}

/// Partition repository backed by the `partition_map` table.
///
/// Metadata lives on the master database; collections are hypertables in
/// the schema the instrument catalog assigns.
pub struct PgPartitionRepository {
    pool: PgPool,
    router: InstrumentRouter,
}

impl PgPartitionRepository {
    pub fn new(router: InstrumentRouter) -> Self {
        Self {
            pool: router.master().clone(),
            router,
        }
    }

    /// Get the database pool reference
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn router(&self) -> &InstrumentRouter {
        &self.router
    }

    /// Parse rows, skipping the ones that do not describe a valid partition
    fn parse_rows(rows: &[PgRow]) -> Vec<PartitionRecord> {
        rows.iter()
            .filter_map(|row| match record_from_row(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable partition row: {}", e);
                    None
                }
            })
            .collect()
    }

    async fn collection_exists(
        &self,
        pool: &PgPool,
        schema: &str,
        collection_name: &str,
    ) -> RepositoryResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            ) AS present
            "#,
        )
        .bind(schema)
        .bind(collection_name)
        .fetch_one(pool)
        .await?;

        Ok(row.try_get("present")?)
    }
}

fn record_from_row(row: &PgRow) -> RepositoryResult<PartitionRecord> {
    let status: String = row.try_get("status")?;
    let status = PartitionStatus::from_str(&status)
        .ok_or_else(|| RepositoryError::InvalidData(format!("unknown status '{}'", status)))?;

    let record = PartitionRecord {
        instrument: row.try_get("instrument")?,
        resolution: row.try_get("resolution")?,
        collection_name: row.try_get("collection_name")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        storage_backend: row.try_get("storage_backend")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    };

    if record.start_date > record.end_date {
        return Err(RepositoryError::InvalidData(format!(
            "{} ends before it starts",
            record.collection_name
        )));
    }

    Ok(record)
}

#[async_trait]
impl PartitionRepository for PgPartitionRepository {
    async fn find_overlapping(
        &self,
        instrument: &str,
        resolution: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<PartitionRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM {PARTITION_MAP_TABLE}
            WHERE instrument = $1 AND resolution = $2 AND status = 'active'
              AND start_date <= $4 AND end_date >= $3
            ORDER BY start_date ASC
            "#
        ))
        .bind(instrument)
        .bind(resolution)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(Self::parse_rows(&rows))
    }

    async fn find_prev(
        &self,
        instrument: &str,
        resolution: &str,
        before: DateTime<Utc>,
    ) -> RepositoryResult<Option<PartitionRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM {PARTITION_MAP_TABLE}
            WHERE instrument = $1 AND resolution = $2 AND status = 'active'
              AND end_date < $3
            ORDER BY end_date DESC
            LIMIT 1
            "#
        ))
        .bind(instrument)
        .bind(resolution)
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        Ok(Self::parse_rows(&rows).into_iter().next())
    }

    async fn find_next(
        &self,
        instrument: &str,
        resolution: &str,
        after: DateTime<Utc>,
    ) -> RepositoryResult<Option<PartitionRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM {PARTITION_MAP_TABLE}
            WHERE instrument = $1 AND resolution = $2 AND status = 'active'
              AND start_date > $3
            ORDER BY start_date ASC
            LIMIT 1
            "#
        ))
        .bind(instrument)
        .bind(resolution)
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        Ok(Self::parse_rows(&rows).into_iter().next())
    }

    async fn list_active(
        &self,
        instrument: &str,
        resolution: &str,
    ) -> RepositoryResult<Vec<PartitionRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM {PARTITION_MAP_TABLE}
            WHERE instrument = $1 AND resolution = $2 AND status = 'active'
            ORDER BY start_date ASC
            "#
        ))
        .bind(instrument)
        .bind(resolution)
        .fetch_all(&self.pool)
        .await?;

        Ok(Self::parse_rows(&rows))
    }

    async fn insert(&self, record: &PartitionRecord) -> RepositoryResult<InsertOutcome> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {PARTITION_MAP_TABLE} ({RECORD_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT DO NOTHING
            "#
        ))
        .bind(&record.instrument)
        .bind(&record.resolution)
        .bind(&record.collection_name)
        .bind(record.start_date)
        .bind(record.end_date)
        .bind(&record.storage_backend)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("Partition start already taken: {}", record);
            Ok(InsertOutcome::Conflict)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn check_target(&self, instrument: &str, collection_name: &str) -> RepositoryResult<()> {
        validate_identifier(collection_name)?;
        self.router.target(instrument)?;
        Ok(())
    }

    async fn create_time_series_collection_if_not_exists(
        &self,
        collection_name: &str,
        resolution: &str,
        instrument: &str,
    ) -> RepositoryResult<CollectionProvisioning> {
        validate_identifier(collection_name)?;
        let target = self.router.target(instrument)?;

        if self
            .collection_exists(&target.pool, &target.schema, collection_name)
            .await?
        {
            debug!("Collection {}.{} already exists", target.schema, collection_name);
            return Ok(CollectionProvisioning::AlreadyExists);
        }

        let options = TimeSeriesOptions::for_resolution(resolution)?;
        let table = qualified_name(&target.schema, collection_name);

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&target.schema)))
            .execute(&target.pool)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                {time} TIMESTAMPTZ NOT NULL,
                {date} DATE NOT NULL,
                payload JSONB NOT NULL
            )
            "#,
            table = table,
            time = quote_ident(&options.time_field),
            date = quote_ident(&options.date_field),
        ))
        .execute(&target.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            SELECT create_hypertable(
                '{table}',
                '{time}',
                chunk_time_interval => INTERVAL '{span} seconds',
                if_not_exists => TRUE
            )
            "#,
            table = table.replace('\'', "''"),
            time = options.time_field,
            span = options.bucket_max_span_seconds,
        ))
        .execute(&target.pool)
        .await?;

        for field in options.index_fields() {
            let index = format!("idx_{}_{}", collection_name, field);
            let index = if index.len() > 63 {
                format!("idx_{}", &index[index.len() - 59..])
            } else {
                index
            };
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_ident(&index),
                table,
                quote_ident(field)
            ))
            .execute(&target.pool)
            .await?;
        }

        let comment = serde_json::to_string(&options)
            .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;
        sqlx::query(&format!(
            "COMMENT ON TABLE {} IS '{}'",
            table,
            comment.replace('\'', "''")
        ))
        .execute(&target.pool)
        .await?;

        info!(
            "Created time-series collection {} for {} ({} granularity)",
            table, instrument, options.granularity
        );
        Ok(CollectionProvisioning::Created)
    }
}
