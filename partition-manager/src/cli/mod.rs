//! Command-line interface
//!
//! Provides CLI commands for the partition manager.

pub mod db;
pub mod partition;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::Settings;
use crate::resolver::{PartitionResolver, PartitioningConfigProvider};
use crate::storage::{connect_pool, InstrumentRouter, PgPartitionRepository, PgSystemConfigStore};

/// Partition Manager CLI
#[derive(Parser)]
#[command(name = "partition-manager")]
#[command(about = "Date-range partitioning of radio-telescope telemetry collections")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Database operations
    #[command(subcommand)]
    Db(db::DbCommands),
    /// Partition resolution and inspection
    #[command(subcommand)]
    Partition(partition::PartitionCommands),
}

/// Resolver backed by the master database
pub type PgResolver = PartitionResolver<PgPartitionRepository, PgSystemConfigStore>;

/// Load settings from the config directory and environment
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load settings")?;
    debug!(
        "Loaded settings: {} catalog instruments, read failure policy {:?}",
        settings.instruments.len(),
        settings.partitioning.read_failure_policy
    );
    Ok(settings)
}

/// Connect to the master database and build a resolver
pub async fn build_resolver(settings: &Settings) -> Result<PgResolver> {
    let pool = connect_pool(&settings.database)
        .await
        .context("Failed to connect to the master database")?;

    let router = InstrumentRouter::from_settings(pool.clone(), &settings.database, &settings.instruments)?
        .allow_unlisted(settings.partitioning.allow_unlisted_instruments);
    let config = PartitioningConfigProvider::new(
        PgSystemConfigStore::new(pool),
        settings.partitioning.config_document_id.clone(),
    );

    Ok(PartitionResolver::new(
        PgPartitionRepository::new(router),
        config,
        settings.partitioning.resolver_options(),
    ))
}
