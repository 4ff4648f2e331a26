//! Partition resolution and inspection commands

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use std::time::Duration;
use tracing::{error, info};

use telemetry_common::error::retry_with_backoff;

use super::{build_resolver, load_settings};
use crate::partition::time::parse_utc_timestamp;

/// Attempts for transient resolution failures
const RESOLVE_MAX_ATTEMPTS: u32 = 3;

/// Partition subcommands
#[derive(Subcommand)]
pub enum PartitionCommands {
    /// Resolve the collection for a timestamp, creating it if needed
    Resolve(ResolveArgs),
    /// List collections intersecting a date range
    Range(RangeArgs),
    /// List active partitions
    List(ListArgs),
    /// Report overlapping active partitions
    Audit(AuditArgs),
}

/// Partition key shared by all partition commands
#[derive(Args)]
pub struct KeyArgs {
    /// Instrument code (e.g. SST, POEMAS)
    #[arg(long, short)]
    pub instrument: String,

    /// Resolution code (e.g. 10ms, 1s, 1m)
    #[arg(long, short)]
    pub resolution: String,
}

/// Arguments for resolve command
#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Record timestamp, UTC (RFC 3339 or YYYY-MM-DD[THH:MM:SS])
    #[arg(long, short)]
    pub timestamp: String,
}

/// Arguments for range command
#[derive(Args)]
pub struct RangeArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Range start, UTC
    #[arg(long)]
    pub start: String,

    /// Range end, UTC (inclusive)
    #[arg(long)]
    pub end: String,
}

/// Arguments for list command
#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for audit command
#[derive(Args)]
pub struct AuditArgs {
    #[command(flatten)]
    pub key: KeyArgs,
}

/// Execute partition commands
pub async fn execute(cmd: PartitionCommands) -> Result<()> {
    match cmd {
        PartitionCommands::Resolve(args) => execute_resolve(args).await,
        PartitionCommands::Range(args) => execute_range(args).await,
        PartitionCommands::List(args) => execute_list(args).await,
        PartitionCommands::Audit(args) => execute_audit(args).await,
    }
}

async fn execute_resolve(args: ResolveArgs) -> Result<()> {
    let timestamp = parse_utc_timestamp(&args.timestamp)?;
    let settings = load_settings()?;
    let resolver = build_resolver(&settings).await?;

    let resolved = retry_with_backoff(
        || resolver.resolve_partition(&args.key.instrument, &args.key.resolution, timestamp),
        RESOLVE_MAX_ATTEMPTS,
        Duration::from_millis(100),
    )
    .await?;

    if resolved.created {
        info!("Created {}", resolved.record);
    }
    println!("{}", resolved.collection_name());
    Ok(())
}

async fn execute_range(args: RangeArgs) -> Result<()> {
    let start = parse_utc_timestamp(&args.start)?;
    let end = parse_utc_timestamp(&args.end)?;
    let settings = load_settings()?;
    let resolver = build_resolver(&settings).await?;

    let collections = resolver
        .collections_for_range(&args.key.instrument, &args.key.resolution, start, end)
        .await?;

    for name in &collections {
        println!("{}", name);
    }
    info!("{} collections", collections.len());
    Ok(())
}

async fn execute_list(args: ListArgs) -> Result<()> {
    let settings = load_settings()?;
    let resolver = build_resolver(&settings).await?;

    let partitions = resolver
        .list_partitions(&args.key.instrument, &args.key.resolution)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&partitions)?);
        return Ok(());
    }

    if partitions.is_empty() {
        println!("No active partitions");
        return Ok(());
    }

    println!("{:<48} {:<12} {:<12} {:<12}", "Collection", "Start", "End", "Backend");
    println!("{}", "-".repeat(87));
    for partition in &partitions {
        println!(
            "{:<48} {:<12} {:<12} {:<12}",
            partition.collection_name,
            partition.first_day(),
            partition.last_day(),
            partition.storage_backend
        );
    }
    println!("\nTotal: {} partitions", partitions.len());
    Ok(())
}

async fn execute_audit(args: AuditArgs) -> Result<()> {
    let settings = load_settings()?;
    let resolver = build_resolver(&settings).await?;

    let reports = resolver
        .audit_overlaps(&args.key.instrument, &args.key.resolution)
        .await?;

    if reports.is_empty() {
        println!("No overlapping partitions");
        return Ok(());
    }

    for report in &reports {
        error!("Overlap: {}", report);
        println!("{}", report);
    }
    bail!(
        "{} overlapping partition pairs for {}/{}",
        reports.len(),
        args.key.instrument,
        args.key.resolution
    )
}
