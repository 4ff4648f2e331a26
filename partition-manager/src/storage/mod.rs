//! Storage layer for partition metadata and time-series collections
//!
//! The repository holds mechanism only: queries, inserts and idempotent
//! collection provisioning. Every partitioning decision lives in the resolver.
//!
//! Two backends are provided:
//! - `PgPartitionRepository`: PostgreSQL/TimescaleDB via sqlx
//! - `InMemoryPartitionRepository`: process-local, used by tests and dry runs

mod catalog;
mod memory;
mod migrations;
mod postgres;
mod system_config;

pub use catalog::*;
pub use memory::*;
pub use migrations::*;
pub use postgres::*;
pub use system_config::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use telemetry_common::error::{DatabaseError, ErrorCategory, ErrorClassification};

use crate::partition::{Granularity, PartitionRecord};

/// Table holding one row per partition
pub const PARTITION_MAP_TABLE: &str = "partition_map";

/// Table holding status-flagged configuration documents
pub const SYSTEM_CONFIG_TABLE: &str = "system_config";

/// Fixed maximum span of one time-series bucket
pub const BUCKET_MAX_SPAN_SECONDS: u32 = 3600;

/// Repository errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported granularity for resolution '{0}'")]
    UnsupportedGranularity(String),
}

impl ErrorClassification for RepositoryError {
    fn category(&self) -> ErrorCategory {
        match self {
            RepositoryError::Database(e) => DatabaseError::from(e).category(),
            RepositoryError::Unavailable(_) => ErrorCategory::Transient,
            RepositoryError::Configuration(_) => ErrorCategory::Configuration,
            RepositoryError::InvalidData(_) => ErrorCategory::Permanent,
            RepositoryError::UnsupportedGranularity(_) => ErrorCategory::Permanent,
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            RepositoryError::Database(e) => DatabaseError::from(e).suggested_retry_delay(),
            RepositoryError::Unavailable(_) => Some(Duration::from_millis(500)),
            _ => None,
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result of inserting a partition record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An active partition with the same (instrument, resolution, start_date)
    /// already exists; nothing was written.
    Conflict,
}

/// Result of provisioning a physical collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionProvisioning {
    Created,
    AlreadyExists,
}

/// Creation options of a physical time-series collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesOptions {
    /// Precise timestamp of each record
    pub time_field: String,
    /// Logical (calendar) date of each record
    pub date_field: String,
    pub granularity: Granularity,
    pub bucket_max_span_seconds: u32,
}

impl TimeSeriesOptions {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            time_field: "utc_time".to_string(),
            date_field: "date".to_string(),
            granularity,
            bucket_max_span_seconds: BUCKET_MAX_SPAN_SECONDS,
        }
    }

    /// Options for a raw resolution code
    pub fn for_resolution(resolution: &str) -> RepositoryResult<Self> {
        Granularity::for_resolution(resolution)
            .map(Self::new)
            .ok_or_else(|| RepositoryError::UnsupportedGranularity(resolution.to_string()))
    }

    /// Secondary indexes created alongside the collection
    pub fn index_fields(&self) -> [&str; 2] {
        [self.date_field.as_str(), self.time_field.as_str()]
    }
}

/// Partition metadata and collection provisioning
#[async_trait]
pub trait PartitionRepository: Send + Sync {
    /// Active partitions whose range intersects `[start, end]`, ordered by `start_date`
    async fn find_overlapping(
        &self,
        instrument: &str,
        resolution: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<PartitionRecord>>;

    /// Closest active partition with `end_date < before`
    async fn find_prev(
        &self,
        instrument: &str,
        resolution: &str,
        before: DateTime<Utc>,
    ) -> RepositoryResult<Option<PartitionRecord>>;

    /// Closest active partition with `start_date > after`
    async fn find_next(
        &self,
        instrument: &str,
        resolution: &str,
        after: DateTime<Utc>,
    ) -> RepositoryResult<Option<PartitionRecord>>;

    /// All active partitions, ordered by `start_date`
    async fn list_active(
        &self,
        instrument: &str,
        resolution: &str,
    ) -> RepositoryResult<Vec<PartitionRecord>>;

    /// Fail unless a collection named `collection_name` could be created for
    /// `instrument`. Called before a partition row is written.
    async fn check_target(&self, instrument: &str, collection_name: &str) -> RepositoryResult<()>;

    /// Persist a new partition. No overlap checks beyond the storage-level
    /// uniqueness of `(instrument, resolution, start_date)`.
    async fn insert(&self, record: &PartitionRecord) -> RepositoryResult<InsertOutcome>;

    /// Create the physical time-series collection unless it exists
    async fn create_time_series_collection_if_not_exists(
        &self,
        collection_name: &str,
        resolution: &str,
        instrument: &str,
    ) -> RepositoryResult<CollectionProvisioning>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_series_options() {
        let options = TimeSeriesOptions::for_resolution("10ms").unwrap();
        assert_eq!(options.granularity, Granularity::Seconds);
        assert_eq!(options.bucket_max_span_seconds, 3600);
        assert_eq!(options.index_fields(), ["date", "utc_time"]);

        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["timeField"], "utc_time");
        assert_eq!(json["granularity"], "seconds");
        assert_eq!(json["bucketMaxSpanSeconds"], 3600);
    }

    #[test]
    fn test_time_series_options_rejects_unknown_suffix() {
        let err = TimeSeriesOptions::for_resolution("1d").unwrap_err();
        assert!(matches!(err, RepositoryError::UnsupportedGranularity(_)));
    }

    #[test]
    fn test_repository_error_classification() {
        assert!(RepositoryError::Unavailable("down".into()).is_transient());
        assert!(RepositoryError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(RepositoryError::InvalidData("bad row".into()).is_permanent());
        assert_eq!(
            RepositoryError::Configuration("x".into()).category(),
            ErrorCategory::Configuration
        );
    }
}
