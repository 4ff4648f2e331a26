//! Partition domain model
//!
//! Storage-agnostic types and pure date arithmetic:
//! - `Resolution` / `Granularity`: sampling interval parsing and bucket hints
//! - `PartitionRecord`: one contiguous day range owned by a collection
//! - `window`: day bounds, canonical epoch windows and neighbour clipping
//! - `time`: UTC timestamp parsing for callers that start from text

mod record;
mod resolution;
pub mod time;
pub mod window;

pub use record::*;
pub use resolution::*;

use crate::error::{PartitionError, PartitionResult};

/// Validate an instrument code and return its canonical upper-case form, the
/// one used in partition keys and collection names.
pub fn validate_instrument(instrument: &str) -> PartitionResult<String> {
    let code = instrument.trim();
    let valid = !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(PartitionError::InvalidInstrument(instrument.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_instrument() {
        assert_eq!(validate_instrument("SST").unwrap(), "SST");
        assert_eq!(validate_instrument(" POEMAS ").unwrap(), "POEMAS");
        assert_eq!(validate_instrument("RF_1").unwrap(), "RF_1");
        assert_eq!(validate_instrument("sst").unwrap(), "SST");
        assert_eq!(validate_instrument("Poemas").unwrap(), "POEMAS");
        assert!(validate_instrument("").is_err());
        assert!(validate_instrument("SS T").is_err());
        assert!(validate_instrument("SST\"; DROP").is_err());
    }
}
