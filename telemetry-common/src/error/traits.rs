//! Error classification traits for retry logic and error handling.
//!
//! Ingestion jobs run repeatedly over historical data. A failure is either
//! worth retrying (the database blinked, another worker won a race) or it
//! will reproduce forever until someone fixes data or configuration. These
//! traits let errors say which.

use std::time::Duration;

use super::common::*;

/// Classification of error types for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient errors that may resolve on retry (network issues, timeouts, races)
    Transient,
    /// Permanent errors that won't resolve on retry (invalid input, broken invariants)
    Permanent,
    /// Resource exhaustion errors (pool exhausted)
    ResourceExhausted,
    /// Configuration errors (missing config, invalid settings)
    Configuration,
    /// Internal errors (bugs, unexpected state)
    Internal,
}

/// Trait for errors that can classify themselves for retry logic.
pub trait ErrorClassification {
    /// Returns the category of this error
    fn category(&self) -> ErrorCategory;

    /// Returns true if this error is transient and may succeed on retry
    fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::ResourceExhausted
        )
    }

    /// Returns true if this error is permanent and won't succeed on retry
    fn is_permanent(&self) -> bool {
        matches!(self.category(), ErrorCategory::Permanent)
    }

    /// Returns true if retrying without human intervention is pointless
    fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// Suggests a delay before retrying, if applicable
    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self.category() {
            ErrorCategory::Transient => Some(Duration::from_millis(100)),
            ErrorCategory::ResourceExhausted => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    /// Returns the maximum number of retries suggested for this error
    fn max_retries(&self) -> u32 {
        match self.category() {
            ErrorCategory::Transient => 3,
            ErrorCategory::ResourceExhausted => 5,
            _ => 0,
        }
    }
}

impl ErrorClassification for DatabaseError {
    fn category(&self) -> ErrorCategory {
        match self {
            DatabaseError::Connection(_) => ErrorCategory::Transient,
            DatabaseError::PoolExhausted => ErrorCategory::ResourceExhausted,
            DatabaseError::Timeout(_) => ErrorCategory::Transient,
            DatabaseError::Query(_) => ErrorCategory::Permanent,
            DatabaseError::Constraint(_) => ErrorCategory::Permanent,
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            DatabaseError::PoolExhausted => Some(Duration::from_millis(500)),
            DatabaseError::Timeout(_) => Some(Duration::from_millis(100)),
            DatabaseError::Connection(_) => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}

/// Run `operation`, retrying only while it fails with transient errors.
///
/// Fatal errors are returned on the first occurrence.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T, E>
where
    E: ErrorClassification + std::fmt::Debug,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut delay = initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempts += 1;

                if !err.is_transient() || attempts >= max_attempts {
                    return Err(err);
                }

                let retry_delay = err.suggested_retry_delay().unwrap_or(delay);
                tracing::debug!(
                    "Retrying after transient error (attempt {}/{}): {:?}",
                    attempts,
                    max_attempts,
                    err
                );
                tokio::time::sleep(retry_delay).await;

                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum FlakyError {
        Blip,
        Broken,
    }

    impl ErrorClassification for FlakyError {
        fn category(&self) -> ErrorCategory {
            match self {
                FlakyError::Blip => ErrorCategory::Transient,
                FlakyError::Broken => ErrorCategory::Permanent,
            }
        }

        fn suggested_retry_delay(&self) -> Option<Duration> {
            Some(Duration::from_millis(1))
        }
    }

    #[test]
    fn test_database_error_classification() {
        let err = DatabaseError::Connection("refused".to_string());
        assert!(err.is_transient());
        assert!(!err.is_fatal());
        assert!(err.suggested_retry_delay().is_some());

        let err = DatabaseError::Query("syntax error".to_string());
        assert!(err.is_permanent());
        assert!(err.is_fatal());

        let err = DatabaseError::PoolExhausted;
        assert_eq!(err.category(), ErrorCategory::ResourceExhausted);
        assert!(err.is_transient());
    }

    #[test]
    fn test_sqlx_error_mapping() {
        let err = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::PoolExhausted));

        let err = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, FlakyError> = retry_with_backoff(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FlakyError::Blip)
                } else {
                    Ok(n)
                }
            },
            5,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_fatal_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), FlakyError> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FlakyError::Broken)
            },
            5,
            Duration::from_millis(1),
        )
        .await;

        assert!(matches!(result, Err(FlakyError::Broken)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), FlakyError> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FlakyError::Blip)
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
