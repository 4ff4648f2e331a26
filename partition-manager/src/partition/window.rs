//! Calendar-day windows
//!
//! All arithmetic is done on whole UTC calendar days. Windows are anchored at
//! 1970-01-01 so the same day always maps to the same canonical window,
//! whatever order the historical files are ingested in.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use std::fmt;

use crate::error::{PartitionError, PartitionResult};

/// Anchor of every canonical window: 1970-01-01
pub fn epoch_anchor() -> NaiveDate {
    NaiveDate::default()
}

const SECONDS_PER_HOUR: f64 = 3600.0;
const LAST_SECOND_OF_DAY: i64 = 86_399;

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayRange {
    first: NaiveDate,
    last: NaiveDate,
}

impl DayRange {
    /// Create a range without checking ordering; see [`DayRange::is_ordered`]
    pub fn new(first: NaiveDate, last: NaiveDate) -> Self {
        Self { first, last }
    }

    /// The single calendar day containing `timestamp`
    pub fn of(timestamp: DateTime<Utc>) -> Self {
        let day = timestamp.date_naive();
        Self::new(day, day)
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    /// `first` at 00:00:00 UTC
    pub fn start_instant(&self) -> DateTime<Utc> {
        day_start(self.first)
    }

    /// `last` at 23:59:59 UTC
    pub fn end_instant(&self) -> DateTime<Utc> {
        day_end(self.last)
    }

    pub fn is_ordered(&self) -> bool {
        self.first <= self.last
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.first <= day && day <= self.last
    }

    pub fn num_days(&self) -> i64 {
        (self.last - self.first).num_days() + 1
    }
}

impl fmt::Display for DayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.first, self.last)
    }
}

/// `day` at 00:00:00 UTC
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

/// `day` at 23:59:59 UTC
pub fn day_end(day: NaiveDate) -> DateTime<Utc> {
    day_start(day) + TimeDelta::seconds(LAST_SECOND_OF_DAY)
}

/// Inclusive day bounds of `timestamp`
pub fn day_bounds(timestamp: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = DayRange::of(timestamp);
    (day.start_instant(), day.end_instant())
}

/// Number of days a collection should span so it holds roughly
/// `target_docs_per_collection` documents. Never less than one.
pub fn days_per_collection(
    target_docs_per_collection: u64,
    sun_hours_per_day: u32,
    seconds_per_record: f64,
) -> i64 {
    let docs_per_day = f64::from(sun_hours_per_day) * SECONDS_PER_HOUR / seconds_per_record;
    if !docs_per_day.is_finite() || docs_per_day <= 0.0 {
        return 1;
    }

    let days = (target_docs_per_collection as f64 / docs_per_day).floor();
    // `as` saturates, so absurdly large targets stay representable.
    (days as i64).max(1)
}

/// Epoch-anchored window of `days_per_collection` days containing `day`
pub fn canonical_window(day: NaiveDate, days_per_collection: i64) -> PartitionResult<DayRange> {
    let span = days_per_collection.max(1);
    let anchor = epoch_anchor();
    let delta_days = (day - anchor).num_days();
    let window_index = delta_days.div_euclid(span);

    let overflow = || {
        PartitionError::InvalidPartitionRange(format!(
            "canonical window of {} days around {} is outside the supported calendar",
            span, day
        ))
    };

    let offset = window_index.checked_mul(span).ok_or_else(overflow)?;
    let start = add_days(anchor, offset).ok_or_else(overflow)?;
    let end = add_days(start, span - 1).ok_or_else(overflow)?;

    Ok(DayRange::new(start, end))
}

/// Shrink `candidate` so it starts after `prev_last_day` and ends before
/// `next_first_day`.
pub fn clip_window(
    candidate: DayRange,
    prev_last_day: Option<NaiveDate>,
    next_first_day: Option<NaiveDate>,
) -> DayRange {
    let mut first = candidate.first;
    let mut last = candidate.last;

    if let Some(min_first) = prev_last_day.and_then(|d| d.succ_opt()) {
        if min_first > first {
            first = min_first;
        }
    }

    if let Some(max_last) = next_first_day.and_then(|d| d.pred_opt()) {
        if max_last < last {
            last = max_last;
        }
    }

    DayRange::new(first, last)
}

/// Reject a clipped window that is empty or lost the target day. Either case
/// means the stored partitions are inconsistent.
pub fn validate_window(window: DayRange, target_day: NaiveDate) -> PartitionResult<()> {
    if !window.is_ordered() {
        return Err(PartitionError::InvalidPartitionRange(format!(
            "clipped window {} is empty (start after end)",
            window
        )));
    }

    if !window.contains(target_day) {
        return Err(PartitionError::InvalidPartitionRange(format!(
            "clipped window {} no longer contains target day {}",
            window, target_day
        )));
    }

    Ok(())
}

fn add_days(day: NaiveDate, days: i64) -> Option<NaiveDate> {
    TimeDelta::try_days(days).and_then(|delta| day.checked_add_signed(delta))
}
