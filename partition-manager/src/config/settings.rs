//! Application settings and configuration

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::resolver::{ReadFailurePolicy, ResolverOptions};

/// Environment variable prefix, e.g. `PARTITION_MANAGER__DATABASE__URL`
pub const ENV_PREFIX: &str = "PARTITION_MANAGER";

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Master database holding partition metadata and configuration
    pub database: DatabaseSettings,
    #[serde(default)]
    pub partitioning: PartitioningSettings,
    /// Instrument catalog keyed by instrument code
    #[serde(default)]
    pub instruments: HashMap<String, InstrumentSettings>,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

/// Partition resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitioningSettings {
    /// Id of the status-flagged document in `system_config`
    #[serde(default = "default_config_document_id")]
    pub config_document_id: String,
    /// Label stored on every partition record
    #[serde(default = "default_storage_backend")]
    pub storage_backend: String,
    /// What a failed metadata read means to the resolver
    #[serde(default)]
    pub read_failure_policy: ReadFailurePolicy,
    /// Store instruments missing from `[instruments]` on the master database
    /// instead of rejecting them
    #[serde(default)]
    pub allow_unlisted_instruments: bool,
}

fn default_config_document_id() -> String {
    "partitioning".to_string()
}

fn default_storage_backend() -> String {
    "TimescaleDB".to_string()
}

impl Default for PartitioningSettings {
    fn default() -> Self {
        Self {
            config_document_id: default_config_document_id(),
            storage_backend: default_storage_backend(),
            read_failure_policy: ReadFailurePolicy::default(),
            allow_unlisted_instruments: false,
        }
    }
}

impl PartitioningSettings {
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            storage_backend: self.storage_backend.clone(),
            read_failure_policy: self.read_failure_policy,
        }
    }
}

/// Where an instrument's collections live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSettings {
    /// Schema holding the instrument's collections (defaults to the
    /// lower-cased instrument code)
    #[serde(default)]
    pub schema: Option<String>,
    /// Separate database URL; the master database is used when absent
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Load settings from configuration files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_dir(&Self::config_dir(), ENV_PREFIX)
    }

    /// Load settings from `config_dir` with a custom environment variable prefix
    pub fn load_from_dir(config_dir: &str, env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = s.try_deserialize()?;
        settings.normalize_instruments();
        Ok(settings)
    }

    /// Get the configuration directory path
    fn config_dir() -> String {
        std::env::var("PARTITION_MANAGER_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    /// Instrument codes are matched upper-case
    fn normalize_instruments(&mut self) {
        self.instruments = std::mem::take(&mut self.instruments)
            .into_iter()
            .map(|(code, entry)| (code.trim().to_uppercase(), entry))
            .collect();
    }

    /// Create default settings (useful for testing)
    pub fn default_settings() -> Self {
        Settings {
            database: DatabaseSettings {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/craam_master".into()),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                acquire_timeout_secs: default_acquire_timeout(),
            },
            partitioning: PartitioningSettings::default(),
            instruments: HashMap::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::default_settings()
    }
}
