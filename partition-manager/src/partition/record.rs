//! Partition metadata records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::window::DayRange;

/// Partition status
///
/// Only `Active` partitions take part in resolution. Other states are set
/// out-of-band by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStatus {
    Active,
    /// Taken out of service, e.g. created with a bad configuration
    Retired,
    /// Replaced by another partition covering the same days
    Superseded,
}

impl PartitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionStatus::Active => "active",
            PartitionStatus::Retired => "retired",
            PartitionStatus::Superseded => "superseded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(PartitionStatus::Active),
            "retired" => Some(PartitionStatus::Retired),
            "superseded" => Some(PartitionStatus::Superseded),
            _ => None,
        }
    }
}

impl fmt::Display for PartitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contiguous, inclusive range of calendar days owned by a single
/// physical collection for one (instrument, resolution) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub instrument: String,
    pub resolution: String,
    pub collection_name: String,
    /// First day at 00:00:00 UTC
    pub start_date: DateTime<Utc>,
    /// Last day at 23:59:59 UTC
    pub end_date: DateTime<Utc>,
    pub storage_backend: String,
    pub status: PartitionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartitionRecord {
    /// Build a new active partition for `days`. The collection name is derived,
    /// never chosen.
    pub fn new_active(
        instrument: &str,
        resolution: &str,
        days: DayRange,
        storage_backend: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            instrument: instrument.to_string(),
            resolution: resolution.to_string(),
            collection_name: collection_name(instrument, resolution, days.first(), days.last()),
            start_date: days.start_instant(),
            end_date: days.end_instant(),
            storage_backend: storage_backend.to_string(),
            status: PartitionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        self.start_date.date_naive()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end_date.date_naive()
    }

    /// The covered days, normalised to whole calendar days
    pub fn days(&self) -> DayRange {
        DayRange::new(self.first_day(), self.last_day())
    }

    pub fn is_active(&self) -> bool {
        self.status == PartitionStatus::Active
    }

    /// Whether the partition's days intersect `[first, last]`
    pub fn overlaps_days(&self, first: NaiveDate, last: NaiveDate) -> bool {
        self.first_day() <= last && self.last_day() >= first
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.first_day() <= day && day <= self.last_day()
    }
}

impl fmt::Display for PartitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} .. {}] ({})",
            self.collection_name,
            self.first_day(),
            self.last_day(),
            self.status
        )
    }
}

/// Deterministic physical collection name for a partition
pub fn collection_name(
    instrument: &str,
    resolution: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> String {
    format!(
        "data_{}_{}_{}_{}",
        instrument,
        resolution,
        start.format("%Y%m%d"),
        end.format("%Y%m%d")
    )
}
