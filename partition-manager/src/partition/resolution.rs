//! Sampling resolution codes
//!
//! A resolution is written as `<number><unit>` (`10ms`, `1s`, `1m`, `1h`). The
//! code is part of every partition key and collection name, so only the exact
//! codes the decoders emit are accepted: `1S` or `01s` would otherwise open a
//! second timeline for the same stream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PartitionError;

/// Resolution codes emitted by the instrument decoders.
pub const KNOWN_RESOLUTIONS: &[&str] = &[
    "05ms", "10ms", "40ms", "100ms", "500ms", "1s", "5s", "1m", "1h",
];

/// Unit suffix of a resolution code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl ResolutionUnit {
    /// Split a code into its numeric part and unit. `ms` must be checked
    /// before `s` and `m`.
    fn split(code: &str) -> Option<(&str, ResolutionUnit)> {
        let (len, unit) = if code.ends_with("ms") {
            (2, ResolutionUnit::Milliseconds)
        } else if code.ends_with('s') {
            (1, ResolutionUnit::Seconds)
        } else if code.ends_with('m') {
            (1, ResolutionUnit::Minutes)
        } else if code.ends_with('h') {
            (1, ResolutionUnit::Hours)
        } else {
            return None;
        };
        Some((&code[..code.len() - len], unit))
    }

    fn seconds(self) -> f64 {
        match self {
            ResolutionUnit::Milliseconds => 0.001,
            ResolutionUnit::Seconds => 1.0,
            ResolutionUnit::Minutes => 60.0,
            ResolutionUnit::Hours => 3600.0,
        }
    }
}

/// Nominal sampling interval of a data stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    code: String,
    value: f64,
    unit: ResolutionUnit,
}

impl Resolution {
    /// Parse one of the [`KNOWN_RESOLUTIONS`] codes, e.g. `10ms` or `1h`
    pub fn parse(code: &str) -> Result<Self, PartitionError> {
        let trimmed = code.trim();
        let unsupported = || PartitionError::UnsupportedResolution(code.to_string());

        if !KNOWN_RESOLUTIONS.contains(&trimmed) {
            return Err(unsupported());
        }

        let (number, unit) = ResolutionUnit::split(trimmed).ok_or_else(unsupported)?;
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(unsupported());
        }

        let value: f64 = number.parse().map_err(|_| unsupported())?;
        if !value.is_finite() || value <= 0.0 {
            return Err(unsupported());
        }

        Ok(Self {
            code: trimmed.to_string(),
            value,
            unit,
        })
    }

    /// The code as written by the producer, used verbatim in collection names
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn unit(&self) -> ResolutionUnit {
        self.unit
    }

    /// Seconds between two consecutive records
    pub fn seconds_per_record(&self) -> f64 {
        self.value * self.unit.seconds()
    }

    /// Time-series bucketing hint for this resolution
    pub fn granularity(&self) -> Granularity {
        match self.unit {
            ResolutionUnit::Milliseconds | ResolutionUnit::Seconds => Granularity::Seconds,
            ResolutionUnit::Minutes => Granularity::Minutes,
            ResolutionUnit::Hours => Granularity::Hours,
        }
    }
}

impl FromStr for Resolution {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::parse(s)
    }
}

impl TryFrom<String> for Resolution {
    type Error = PartitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Resolution::parse(&value)
    }
}

impl From<Resolution> for String {
    fn from(resolution: Resolution) -> Self {
        resolution.code
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Coarse time-bucketing hint passed to time-series collection creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Seconds,
    Minutes,
    Hours,
}

impl Granularity {
    /// Derive the granularity from a raw resolution code's suffix.
    ///
    /// Only the suffix matters here; `None` for any other suffix.
    pub fn for_resolution(code: &str) -> Option<Self> {
        let lower = code.trim().to_ascii_lowercase();
        if lower.ends_with("ms") || lower.ends_with('s') {
            Some(Granularity::Seconds)
        } else if lower.ends_with('m') {
            Some(Granularity::Minutes)
        } else if lower.ends_with('h') {
            Some(Granularity::Hours)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Seconds => "seconds",
            Granularity::Minutes => "minutes",
            Granularity::Hours => "hours",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
