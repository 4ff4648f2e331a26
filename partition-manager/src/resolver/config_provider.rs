//! Partitioning configuration access
//!
//! The configuration is one status-flagged document. It is validated once
//! per provider and cached for the provider's lifetime; failures are never
//! cached, so a fixed document is picked up by the next call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{PartitionError, PartitionResult};
use crate::partition::{window, Resolution};
use crate::storage::RepositoryResult;

/// Section of the document holding the partitioning parameters
pub const PARTITIONING_SECTION: &str = "partitioning";

/// Status value that makes a document usable
pub const ACTIVE_STATUS: &str = "active";

/// A raw configuration document as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub status: String,
    pub body: Value,
}

impl ConfigDocument {
    /// Document in the stored layout
    pub fn partitioning(target_docs_per_collection: u64, sun_hours_per_day: u32, active: bool) -> Self {
        Self {
            status: if active { ACTIVE_STATUS.to_string() } else { "inactive".to_string() },
            body: serde_json::json!({
                PARTITIONING_SECTION: {
                    "target_docs_per_collection": target_docs_per_collection,
                    "sun_hours_per_day": sun_hours_per_day,
                }
            }),
        }
    }
}

/// Where configuration documents come from
#[async_trait]
pub trait PartitioningConfigSource: Send + Sync {
    /// Document stored under `id`, whatever its status
    async fn fetch(&self, id: &str) -> RepositoryResult<Option<ConfigDocument>>;
}

/// Validated partition sizing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitioningConfig {
    /// Desired maximum document count per collection
    pub target_docs_per_collection: u64,
    /// Hours per day the instruments observe; only used to estimate density
    pub sun_hours_per_day: u32,
}

impl PartitioningConfig {
    pub fn new(target_docs_per_collection: u64, sun_hours_per_day: u32) -> PartitionResult<Self> {
        if target_docs_per_collection == 0 {
            return Err(PartitionError::Configuration(
                "target_docs_per_collection must be a positive integer".into(),
            ));
        }
        if !(1..=24).contains(&sun_hours_per_day) {
            return Err(PartitionError::Configuration(format!(
                "sun_hours_per_day must be between 1 and 24, got {}",
                sun_hours_per_day
            )));
        }

        Ok(Self {
            target_docs_per_collection,
            sun_hours_per_day,
        })
    }

    /// Validate a stored document
    pub fn from_document(id: &str, document: Option<ConfigDocument>) -> PartitionResult<Self> {
        let document = document.ok_or_else(|| {
            PartitionError::Configuration(format!("configuration document '{}' not found", id))
        })?;

        if document.status != ACTIVE_STATUS {
            return Err(PartitionError::Configuration(format!(
                "configuration document '{}' is not active (status '{}')",
                id, document.status
            )));
        }

        let section = document.body.get(PARTITIONING_SECTION).ok_or_else(|| {
            PartitionError::Configuration(format!(
                "configuration document '{}' has no '{}' section",
                id, PARTITIONING_SECTION
            ))
        })?;

        let target = positive_integer(section, "target_docs_per_collection")?;
        let sun_hours = positive_integer(section, "sun_hours_per_day")?;
        let sun_hours = u32::try_from(sun_hours).map_err(|_| {
            PartitionError::Configuration(format!("sun_hours_per_day out of range: {}", sun_hours))
        })?;

        Self::new(target, sun_hours)
    }

    /// Whole days one collection of `resolution` holds
    pub fn days_per_collection(&self, resolution: &Resolution) -> i64 {
        window::days_per_collection(
            self.target_docs_per_collection,
            self.sun_hours_per_day,
            resolution.seconds_per_record(),
        )
    }
}

fn positive_integer(section: &Value, field: &str) -> PartitionResult<u64> {
    match section.get(field) {
        None | Some(Value::Null) => Err(PartitionError::Configuration(format!(
            "missing required field '{}'",
            field
        ))),
        Some(value) => value.as_u64().filter(|n| *n > 0).ok_or_else(|| {
            PartitionError::Configuration(format!(
                "'{}' must be a positive integer, got {}",
                field, value
            ))
        }),
    }
}

/// Lazily loaded, cached partitioning configuration
pub struct PartitioningConfigProvider<S> {
    source: S,
    document_id: String,
    cached: OnceCell<PartitioningConfig>,
}

impl<S: PartitioningConfigSource> PartitioningConfigProvider<S> {
    pub fn new(source: S, document_id: impl Into<String>) -> Self {
        Self {
            source,
            document_id: document_id.into(),
            cached: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// The validated configuration, loading it on first use
    pub async fn get(&self) -> PartitionResult<PartitioningConfig> {
        let config = self
            .cached
            .get_or_try_init(|| async {
                debug!("Loading partitioning configuration '{}'", self.document_id);
                let document = self.source.fetch(&self.document_id).await?;
                let config = PartitioningConfig::from_document(&self.document_id, document)?;
                info!(
                    "Partitioning configuration: {} docs per collection, {} sun hours per day",
                    config.target_docs_per_collection, config.sun_hours_per_day
                );
                Ok::<_, PartitionError>(config)
            })
            .await?;

        Ok(*config)
    }

    /// Whether a configuration has been loaded and cached
    pub fn is_loaded(&self) -> bool {
        self.cached.initialized()
    }
}
