//! Shared ambient concerns for the telemetry ingestion services
//!
//! - `error`: error classification and retry helpers
//! - `logging`: tracing subscriber initialisation

pub mod error;
pub mod logging;
