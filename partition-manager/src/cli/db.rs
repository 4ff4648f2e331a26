//! Database management commands

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use super::load_settings;
use crate::resolver::{ConfigDocument, PartitioningConfig};
use crate::storage::{connect_pool, MetadataMigrations, PgSystemConfigStore};

/// Database subcommands
#[derive(Subcommand)]
pub enum DbCommands {
    /// Create the partition metadata tables
    Migrate,
    /// Store the partitioning configuration document
    SeedConfig(SeedConfigArgs),
}

/// Arguments for seed-config command
#[derive(Args)]
pub struct SeedConfigArgs {
    /// Desired maximum number of documents per collection
    #[arg(long)]
    pub target_docs: u64,

    /// Hours per day the instruments observe
    #[arg(long, default_value = "10")]
    pub sun_hours: u32,

    /// Store the document with an inactive status
    #[arg(long)]
    pub inactive: bool,
}

/// Execute database commands
pub async fn execute(cmd: DbCommands) -> Result<()> {
    match cmd {
        DbCommands::Migrate => execute_migrate().await,
        DbCommands::SeedConfig(args) => execute_seed_config(args).await,
    }
}

async fn execute_migrate() -> Result<()> {
    let settings = load_settings()?;
    let pool = connect_pool(&settings.database).await?;

    MetadataMigrations::new(pool).run().await?;

    println!("Migrations completed");
    Ok(())
}

async fn execute_seed_config(args: SeedConfigArgs) -> Result<()> {
    // Refuse to store values the resolver would reject
    let config = PartitioningConfig::new(args.target_docs, args.sun_hours)?;

    let settings = load_settings()?;
    let pool = connect_pool(&settings.database).await?;
    let store = PgSystemConfigStore::new(pool);

    let id = &settings.partitioning.config_document_id;
    let document = ConfigDocument::partitioning(
        config.target_docs_per_collection,
        config.sun_hours_per_day,
        !args.inactive,
    );
    store.upsert(id, &document).await?;

    info!("Seeded partitioning configuration: {:?}", config);
    println!(
        "Stored '{}': target_docs_per_collection={}, sun_hours_per_day={}, status={}",
        id, config.target_docs_per_collection, config.sun_hours_per_day, document.status
    );
    Ok(())
}
