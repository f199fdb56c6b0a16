//! Log-assigned identifiers for click events.

use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Identifier assigned by the click log at append time.
///
/// Rendered as `"<millis>-<seq>"` (the Redis Streams format). Ids are
/// strictly increasing in append order, and ordering compares `millis`
/// first, then `seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EventId {
    pub millis: u64,
    pub seq: u64,
}

impl EventId {
    pub const fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for EventId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (millis, seq) = s
            .split_once('-')
            .ok_or_else(|| AppError::payload(format!("malformed event id '{s}'")))?;

        let millis = millis
            .parse()
            .map_err(|_| AppError::payload(format!("malformed event id '{s}'")))?;
        let seq = seq
            .parse()
            .map_err(|_| AppError::payload(format!("malformed event id '{s}'")))?;

        Ok(Self { millis, seq })
    }
}

/// One raw entry read back from the click log.
///
/// `payload` is `None` when the entry was trimmed from the log while still
/// pending, which Redis reports as an id with no fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: EventId,
    pub payload: Option<String>,
}
