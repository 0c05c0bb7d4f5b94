//! Time-ordered identifiers.
//!
//! Platform ids embed their creation time in the upper 42 bits, counted in
//! milliseconds from a fixed epoch. That makes id order equal to time order,
//! which pagination relies on: a timestamp can be turned into a `before`
//! cursor without a round trip.
//!
//! ```
//! use chatsweep::Snowflake;
//! use chrono::{TimeZone, Utc};
//!
//! let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let id = Snowflake::from_datetime(at);
//! assert_eq!(id.timestamp(), at);
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Platform epoch (2015-01-01T00:00:00Z) in Unix milliseconds.
pub const EPOCH_MS: i64 = 1_420_070_400_000;

const TIMESTAMP_SHIFT: u32 = 22;

/// Largest millisecond offset that fits in the timestamp bits.
const MAX_OFFSET_MS: u64 = (1 << (64 - TIMESTAMP_SHIFT)) - 1;

/// A time-embedding platform identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Creates a snowflake from its raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Encodes a timestamp as the smallest id that could have been created at it.
    ///
    /// Timestamps before the epoch saturate to zero, timestamps past the end
    /// of the id space (around the year 2154) to `u64::MAX`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let offset = dt.timestamp_millis().saturating_sub(EPOCH_MS);
        match u64::try_from(offset) {
            Err(_) => Self(0),
            Ok(offset) if offset > MAX_OFFSET_MS => Self(u64::MAX),
            Ok(offset) => Self(offset << TIMESTAMP_SHIFT),
        }
    }

    /// Decodes the creation time embedded in this id.
    pub fn timestamp(self) -> DateTime<Utc> {
        let ms = (self.0 >> TIMESTAMP_SHIFT) as i64 + EPOCH_MS;
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or_default()
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl From<u64> for Snowflake {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
