//! Partition resolution
//!
//! `PartitionResolver` owns every partitioning decision: which collection a
//! record belongs to, how large a new partition is, and how it is clipped
//! against its neighbours. Storage access goes through `PartitionRepository`.
//!
//! # Resolution flow
//!
//! 1. Fast path: an active partition already covers the record's day.
//! 2. Otherwise size a canonical, epoch-anchored window from the cached
//!    partitioning configuration.
//! 3. Clip the window against the nearest partitions before and after the day.
//! 4. Re-check for overlaps, persist the record, provision the collection.
//!
//! Concurrent writers are arbitrated by the storage-level uniqueness of the
//! partition start day: the loser of a race re-reads and adopts the winner's
//! partition when it covers the target day.

mod config_provider;

pub use config_provider::*;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::error::{PartitionError, PartitionResult};
use crate::partition::window::{self, DayRange};
use crate::partition::{validate_instrument, PartitionRecord, Resolution};
use crate::storage::{InsertOutcome, PartitionRepository, RepositoryResult};

/// What a failed metadata read means during resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Log the failure and continue as if nothing was found
    #[default]
    TreatAsEmpty,
    /// Fail the resolution with the storage error
    Propagate,
}

/// Resolver behaviour knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Label stored on every new partition record
    pub storage_backend: String,
    pub read_failure_policy: ReadFailurePolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            storage_backend: "TimescaleDB".to_string(),
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }
}

/// The partition owning a resolved record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPartition {
    pub record: PartitionRecord,
    /// Whether this call created the partition
    pub created: bool,
}

impl ResolvedPartition {
    pub fn collection_name(&self) -> &str {
        &self.record.collection_name
    }
}

/// Two active partitions claiming the same days
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapReport {
    pub first: String,
    pub second: String,
    /// Days claimed by both
    pub shared_first_day: NaiveDate,
    pub shared_last_day: NaiveDate,
}

impl fmt::Display for OverlapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} and {} both claim {} .. {}",
            self.first, self.second, self.shared_first_day, self.shared_last_day
        )
    }
}

/// Resolves (instrument, resolution, timestamp) to a collection
pub struct PartitionResolver<R, S> {
    repository: R,
    config: PartitioningConfigProvider<S>,
    options: ResolverOptions,
}

impl<R, S> PartitionResolver<R, S>
where
    R: PartitionRepository,
    S: PartitioningConfigSource,
{
    pub fn new(repository: R, config: PartitioningConfigProvider<S>, options: ResolverOptions) -> Self {
        Self {
            repository,
            config,
            options,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config_provider(&self) -> &PartitioningConfigProvider<S> {
        &self.config
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Name of the collection `timestamp` belongs to, creating the partition
    /// and its collection when no active partition covers the day.
    pub async fn resolve(
        &self,
        instrument: &str,
        resolution: &str,
        timestamp: DateTime<Utc>,
    ) -> PartitionResult<String> {
        let resolved = self.resolve_partition(instrument, resolution, timestamp).await?;
        Ok(resolved.record.collection_name)
    }

    /// Like `resolve`, returning the owning partition record
    pub async fn resolve_partition(
        &self,
        instrument: &str,
        resolution: &str,
        timestamp: DateTime<Utc>,
    ) -> PartitionResult<ResolvedPartition> {
        let canonical = validate_instrument(instrument)?;
        let instrument = canonical.as_str();
        let resolution = Resolution::parse(resolution)?;
        let code = resolution.code();
        let target = DayRange::of(timestamp);

        if let Some(record) = self.covering(instrument, code, target).await? {
            debug!("{}/{} {} -> {}", instrument, code, target, record.collection_name);
            return Ok(ResolvedPartition {
                record,
                created: false,
            });
        }

        let config = self.config.get().await?;
        let days_per_collection = config.days_per_collection(&resolution);
        let candidate = window::canonical_window(target.first(), days_per_collection)?;

        let prev = self.read(
            "find_prev",
            self.repository
                .find_prev(instrument, code, target.start_instant())
                .await,
        )?;
        let next = self.read(
            "find_next",
            self.repository
                .find_next(instrument, code, target.end_instant())
                .await,
        )?;

        let clipped = window::clip_window(
            candidate,
            prev.as_ref().map(PartitionRecord::last_day),
            next.as_ref().map(PartitionRecord::first_day),
        );
        if let Err(e) = window::validate_window(clipped, target.first()) {
            error!(
                "{}/{}: candidate {} clipped by prev {:?} and next {:?}: {}",
                instrument,
                code,
                candidate,
                prev.as_ref().map(|p| &p.collection_name),
                next.as_ref().map(|p| &p.collection_name),
                e
            );
            return Err(e);
        }
        debug!(
            "{}/{}: {} days per collection, candidate {}, clipped {}",
            instrument, code, days_per_collection, candidate, clipped
        );

        let overlapping = self.read(
            "find_overlapping",
            self.repository
                .find_overlapping(instrument, code, clipped.start_instant(), clipped.end_instant())
                .await,
        )?;
        if !overlapping.is_empty() {
            let existing: Vec<String> = overlapping.into_iter().map(|p| p.collection_name).collect();
            error!(
                "{}/{}: new partition {} would overlap {:?}",
                instrument, code, clipped, existing
            );
            return Err(PartitionError::PartitionOverlap {
                instrument: instrument.to_string(),
                resolution: code.to_string(),
                start: clipped.first(),
                end: clipped.last(),
                existing,
            });
        }

        let record = PartitionRecord::new_active(
            instrument,
            code,
            clipped,
            &self.options.storage_backend,
            Utc::now(),
        );

        // No partition row may point at a collection that cannot be created
        self.repository
            .check_target(instrument, &record.collection_name)
            .await?;

        let resolved = match self.repository.insert(&record).await? {
            InsertOutcome::Inserted => {
                info!("Created partition {} for {}/{}", record, instrument, code);
                ResolvedPartition {
                    record,
                    created: true,
                }
            }
            InsertOutcome::Conflict => {
                let winner = self.covering(instrument, code, target).await?;
                match winner {
                    Some(existing) => {
                        info!(
                            "Partition for {}/{} {} was created concurrently: {}",
                            instrument, code, target, existing
                        );
                        ResolvedPartition {
                            record: existing,
                            created: false,
                        }
                    }
                    None => {
                        warn!(
                            "Start day {} for {}/{} taken by another writer",
                            clipped.first(),
                            instrument,
                            code
                        );
                        return Err(PartitionError::ConcurrentPartitionCreation {
                            instrument: instrument.to_string(),
                            resolution: code.to_string(),
                            start: clipped.first(),
                        });
                    }
                }
            }
        };

        // Idempotent; also covers a concurrent writer that failed before provisioning
        self.repository
            .create_time_series_collection_if_not_exists(
                &resolved.record.collection_name,
                code,
                instrument,
            )
            .await?;

        Ok(resolved)
    }

    /// Collections intersecting `[start, end]`, widened to whole days,
    /// ordered by start date.
    pub async fn collections_for_range(
        &self,
        instrument: &str,
        resolution: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PartitionResult<Vec<String>> {
        let canonical = validate_instrument(instrument)?;
        let instrument = canonical.as_str();
        let resolution = Resolution::parse(resolution)?;

        if start > end {
            return Err(PartitionError::InvalidPartitionRange(format!(
                "range start {} is after range end {}",
                start, end
            )));
        }

        let range = DayRange::new(start.date_naive(), end.date_naive());
        let partitions = self
            .repository
            .find_overlapping(
                instrument,
                resolution.code(),
                range.start_instant(),
                range.end_instant(),
            )
            .await?;

        debug!(
            "{}/{} {}: {} collections",
            instrument,
            resolution,
            range,
            partitions.len()
        );
        Ok(partitions.into_iter().map(|p| p.collection_name).collect())
    }

    /// All active partitions, ordered by start date
    pub async fn list_partitions(
        &self,
        instrument: &str,
        resolution: &str,
    ) -> PartitionResult<Vec<PartitionRecord>> {
        let canonical = validate_instrument(instrument)?;
        let instrument = canonical.as_str();
        let resolution = Resolution::parse(resolution)?;

        Ok(self
            .repository
            .list_active(instrument, resolution.code())
            .await?)
    }

    /// Every pair of active partitions claiming the same days. Detection only.
    pub async fn audit_overlaps(
        &self,
        instrument: &str,
        resolution: &str,
    ) -> PartitionResult<Vec<OverlapReport>> {
        let mut partitions = self.list_partitions(instrument, resolution).await?;
        partitions.sort_by_key(|p| p.start_date);

        let mut reports = Vec::new();
        for (i, first) in partitions.iter().enumerate() {
            for second in &partitions[i + 1..] {
                if second.first_day() > first.last_day() {
                    break;
                }
                reports.push(OverlapReport {
                    first: first.collection_name.clone(),
                    second: second.collection_name.clone(),
                    shared_first_day: second.first_day(),
                    shared_last_day: first.last_day().min(second.last_day()),
                });
            }
        }

        if !reports.is_empty() {
            warn!(
                "{} overlapping partition pairs for {}/{}",
                reports.len(),
                instrument,
                resolution
            );
        }
        Ok(reports)
    }

    /// The active partition covering `day`, if any
    async fn covering(
        &self,
        instrument: &str,
        resolution: &str,
        day: DayRange,
    ) -> PartitionResult<Option<PartitionRecord>> {
        let found = self.read(
            "find_overlapping",
            self.repository
                .find_overlapping(instrument, resolution, day.start_instant(), day.end_instant())
                .await,
        )?;

        if found.len() > 1 {
            warn!(
                "{} active partitions cover {}/{} {}; using the earliest",
                found.len(),
                instrument,
                resolution,
                day
            );
        }
        Ok(found.into_iter().next())
    }

    /// Apply the read failure policy to a repository read
    fn read<T: Default>(&self, operation: &str, result: RepositoryResult<T>) -> PartitionResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => match self.options.read_failure_policy {
                ReadFailurePolicy::TreatAsEmpty => {
                    warn!("{} failed, treating as no partitions: {}", operation, e);
                    Ok(T::default())
                }
                ReadFailurePolicy::Propagate => Err(e.into()),
            },
        }
    }
}
