//! UTC timestamp parsing
//!
//! Every day boundary is a UTC calendar day. Timestamps that carry another
//! zone offset are rejected instead of being shifted into a different day.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::{PartitionError, PartitionResult};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Accept a zoned timestamp only if its offset is UTC
pub fn ensure_utc(timestamp: DateTime<FixedOffset>) -> PartitionResult<DateTime<Utc>> {
    if timestamp.offset().local_minus_utc() != 0 {
        return Err(PartitionError::InvalidTimestamp(format!(
            "{} carries offset {}; only UTC timestamps are accepted",
            timestamp,
            timestamp.offset()
        )));
    }
    Ok(timestamp.with_timezone(&Utc))
}

/// Parse a timestamp given on the command line or in a queue message.
///
/// Accepts RFC 3339 with a zero offset, naive `YYYY-MM-DD[ T]HH:MM:SS[.f]`,
/// or a bare `YYYY-MM-DD` (midnight). Naive values are read as UTC.
pub fn parse_utc_timestamp(input: &str) -> PartitionResult<DateTime<Utc>> {
    let s = input.trim();

    if let Ok(zoned) = DateTime::parse_from_rfc3339(s) {
        return ensure_utc(zoned);
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    Err(PartitionError::InvalidTimestamp(format!(
        "'{}' is not an RFC 3339 or YYYY-MM-DD[THH:MM:SS] timestamp",
        input
    )))
}
