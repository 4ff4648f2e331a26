//! Partition Manager CLI
//!
//! Provides commands for:
//! - `db`: Metadata migrations and configuration seeding
//! - `partition`: Resolve, list and audit partitions

use anyhow::Result;
use clap::Parser;

use partition_manager::cli::{Cli, Commands};
use telemetry_common::logging::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let log_config = LogConfig::detect().with_app_name("partition-manager");
    init_logging(log_config).map_err(|e| anyhow::anyhow!(e))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    match cli.command {
        Commands::Db(cmd) => {
            partition_manager::cli::db::execute(cmd).await?;
        }
        Commands::Partition(cmd) => {
            partition_manager::cli::partition::execute(cmd).await?;
        }
    }

    Ok(())
}
