//! Partition Manager
//!
//! Routes radio-telescope telemetry records to date-range partitioned
//! time-series collections and manages the lifecycle of those collections.
//!
//! # Architecture
//!
//! ```text
//! (instrument, resolution, timestamp)
//!             │
//!             ▼
//!   ┌───────────────────┐      ┌──────────────────────────────┐
//!   │ PartitionResolver │─────▶│ PartitioningConfigProvider   │
//!   │  sizing, windows, │      │  (cached, system_config)     │
//!   │  clipping         │      └──────────────────────────────┘
//!   └─────────┬─────────┘
//!             ▼
//!   ┌───────────────────┐      ┌──────────────────────────────┐
//!   │ PartitionRepository│────▶│ partition_map + hypertables  │
//!   └───────────────────┘      └──────────────────────────────┘
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod partition;
pub mod resolver;
pub mod storage;

pub use error::{PartitionError, PartitionResult};
pub use partition::{Granularity, PartitionRecord, PartitionStatus, Resolution};
pub use resolver::{
    PartitionResolver, PartitioningConfig, PartitioningConfigProvider, ReadFailurePolicy,
    ResolvedPartition, ResolverOptions,
};
pub use storage::{InMemoryPartitionRepository, PartitionRepository, PgPartitionRepository};
