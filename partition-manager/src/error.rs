//! Partition resolution errors

use std::time::Duration;
use thiserror::Error;

use telemetry_common::error::{ErrorCategory, ErrorClassification};

use crate::storage::RepositoryError;

/// Errors raised while resolving a record to its collection.
///
/// Everything except `ConcurrentPartitionCreation` and transient `Storage`
/// failures is fatal: retrying reproduces the same failure.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PartitionError {
    #[error("Invalid instrument code: '{0}'")]
    InvalidInstrument(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unsupported resolution: '{0}'")]
    UnsupportedResolution(String),

    #[error("Resolution '{0}' has no time-series granularity")]
    UnsupportedGranularity(String),

    #[error("Partitioning configuration error: {0}")]
    Configuration(String),

    #[error("Invalid partition range: {0}")]
    InvalidPartitionRange(String),

    #[error("Partition {start}..{end} for {instrument}/{resolution} overlaps existing partitions: {existing:?}")]
    PartitionOverlap {
        instrument: String,
        resolution: String,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        existing: Vec<String>,
    },

    #[error("Another writer created a partition for {instrument}/{resolution} starting {start} that does not cover the target day")]
    ConcurrentPartitionCreation {
        instrument: String,
        resolution: String,
        start: chrono::NaiveDate,
    },

    #[error("Storage error: {0}")]
    Storage(RepositoryError),
}

impl From<RepositoryError> for PartitionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UnsupportedGranularity(code) => {
                PartitionError::UnsupportedGranularity(code)
            }
            other => PartitionError::Storage(other),
        }
    }
}

impl ErrorClassification for PartitionError {
    fn category(&self) -> ErrorCategory {
        match self {
            PartitionError::InvalidInstrument(_)
            | PartitionError::InvalidTimestamp(_)
            | PartitionError::UnsupportedResolution(_)
            | PartitionError::UnsupportedGranularity(_)
            | PartitionError::InvalidPartitionRange(_)
            | PartitionError::PartitionOverlap { .. } => ErrorCategory::Permanent,
            PartitionError::Configuration(_) => ErrorCategory::Configuration,
            PartitionError::ConcurrentPartitionCreation { .. } => ErrorCategory::Transient,
            PartitionError::Storage(err) => err.category(),
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            PartitionError::ConcurrentPartitionCreation { .. } => Some(Duration::from_millis(50)),
            PartitionError::Storage(err) => err.suggested_retry_delay(),
            _ => None,
        }
    }
}

pub type PartitionResult<T> = Result<T, PartitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors_are_not_retried() {
        let fatal = [
            PartitionError::UnsupportedResolution("9xyz".into()),
            PartitionError::UnsupportedGranularity("1d".into()),
            PartitionError::Configuration("missing".into()),
            PartitionError::InvalidPartitionRange("empty".into()),
            PartitionError::PartitionOverlap {
                instrument: "SST".into(),
                resolution: "1s".into(),
                start: chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
                end: chrono::NaiveDate::from_ymd_opt(1970, 1, 10).unwrap(),
                existing: vec!["data_SST_1s_19700101_19700110".into()],
            },
        ];

        for err in fatal {
            assert!(err.is_fatal(), "{err} should be fatal");
            assert_eq!(err.max_retries(), 0);
            assert!(err.suggested_retry_delay().is_none());
        }
    }

    #[test]
    fn test_concurrent_creation_is_retryable() {
        let err = PartitionError::ConcurrentPartitionCreation {
            instrument: "SST".into(),
            resolution: "1s".into(),
            start: chrono::NaiveDate::from_ymd_opt(1970, 1, 21).unwrap(),
        };
        assert!(err.is_transient());
        assert!(err.suggested_retry_delay().is_some());
    }

    #[test]
    fn test_repository_error_conversion() {
        let err: PartitionError = RepositoryError::UnsupportedGranularity("1d".into()).into();
        assert!(matches!(err, PartitionError::UnsupportedGranularity(_)));

        let err: PartitionError = RepositoryError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, PartitionError::Storage(_)));
        assert!(err.is_transient());

        let err: PartitionError = RepositoryError::Configuration("disabled".into()).into();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
