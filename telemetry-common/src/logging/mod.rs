//! Logging setup shared by every telemetry service binary.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter (e.g., `info`, `partition_manager=debug`)
//! - `LOG_LEVEL`: Fallback level when `RUST_LOG` is not set
//! - `LOG_FORMAT`: `pretty` (default), `compact`, or `json`
//! - `LOG_TIMESTAMPS`: `local` (default), `utc`, or `none`

mod config;

pub use config::{init_logging, LogConfig, LogFormat, TimestampFormat};
