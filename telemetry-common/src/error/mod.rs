//! Shared error handling for the telemetry ingestion services.
//!
//! This module provides:
//! - Error classification so callers can tell fatal failures from retryable ones
//! - A retry helper that only retries transient failures
//! - The shared database error mapping
//!
//! # Usage
//!
//! ```rust,ignore
//! use telemetry_common::error::{retry_with_backoff, ErrorClassification};
//!
//! let collection = retry_with_backoff(|| resolver.resolve("SST", "1s", ts), 3, delay).await?;
//! ```

mod common;
mod traits;

pub use common::*;
pub use traits::*;
