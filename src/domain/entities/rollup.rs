//! Rollup keys, deltas and the applied-watermark counter.
//!
//! A rollup row is keyed by `(short code, bucket)` where the bucket carries
//! its granularity, its UTC start and an optional device class. Each row
//! remembers the highest event id already folded into it, which is what makes
//! replaying a batch harmless.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, DurationRound, NaiveDate, TimeDelta, Utc};

use crate::domain::device_class::DeviceClass;
use crate::domain::event_id::EventId;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    /// Truncates `ts` to the start of its UTC bucket.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let step = match self {
            Granularity::Hour => TimeDelta::hours(1),
            Granularity::Day => TimeDelta::days(1),
        };
        // Only fails for spans that don't divide a day, which these never are.
        ts.duration_trunc(step).unwrap_or(ts)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Ok(Granularity::Hour),
            "day" | "daily" => Ok(Granularity::Day),
            other => Err(AppError::payload(format!("unknown granularity '{other}'"))),
        }
    }
}

/// One rollup bucket for a short code.
///
/// `device = None` is the base rollup counted for every click; `Some(class)`
/// is the optional device dimension layered on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RollupBucket {
    pub granularity: Granularity,
    pub start: DateTime<Utc>,
    pub device: Option<DeviceClass>,
}

impl RollupBucket {
    pub fn containing(granularity: Granularity, ts: DateTime<Utc>) -> Self {
        Self {
            granularity,
            start: granularity.bucket_start(ts),
            device: None,
        }
    }

    pub fn with_device(mut self, device: DeviceClass) -> Self {
        self.device = Some(device);
        self
    }

    /// Calendar date of a day bucket.
    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Storage label for the device column; the base rollup uses `any`.
    pub fn device_label(&self) -> &'static str {
        self.device.map_or(BASE_DEVICE_LABEL, |d| d.as_str())
    }
}

pub const BASE_DEVICE_LABEL: &str = "any";

/// The events one batch contributes to a single rollup key.
///
/// Ids are kept sorted and de-duplicated; the delta's count is their number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollupDelta {
    event_ids: Vec<EventId>,
}

impl RollupDelta {
    pub fn from_ids(mut event_ids: Vec<EventId>) -> Self {
        event_ids.sort_unstable();
        event_ids.dedup();
        Self { event_ids }
    }

    pub fn push(&mut self, id: EventId) {
        match self.event_ids.last() {
            Some(last) if *last < id => self.event_ids.push(id),
            None => self.event_ids.push(id),
            Some(_) => {
                if let Err(pos) = self.event_ids.binary_search(&id) {
                    self.event_ids.insert(pos, id);
                }
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.event_ids.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.event_ids.is_empty()
    }

    pub fn event_ids(&self) -> &[EventId] {
        &self.event_ids
    }

    /// Highest contributing id, which becomes the row's new watermark.
    pub fn high_water(&self) -> Option<EventId> {
        self.event_ids.last().copied()
    }

    /// Ids strictly newer than `watermark`.
    pub fn newer_than(&self, watermark: Option<EventId>) -> u64 {
        match watermark {
            None => self.count(),
            Some(mark) => {
                let applied = self.event_ids.partition_point(|id| *id <= mark);
                (self.event_ids.len() - applied) as u64
            }
        }
    }

    /// Split into parallel `(millis, seq)` columns for array binds.
    pub fn columns(&self) -> (Vec<u64>, Vec<u64>) {
        self.event_ids.iter().map(|id| (id.millis, id.seq)).unzip()
    }
}

/// A counter that only adds events newer than what it already applied.
///
/// This is the in-process mirror of the SQL upsert used for rollup rows and
/// link totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedCount {
    pub count: u64,
    pub applied_through: Option<EventId>,
}

impl AppliedCount {
    /// Folds `delta` in and returns how much was actually added.
    pub fn apply(&mut self, delta: &RollupDelta) -> u64 {
        let added = delta.newer_than(self.applied_through);
        self.count += added;
        if let Some(high) = delta.high_water() {
            self.applied_through = Some(self.applied_through.map_or(high, |mark| mark.max(high)));
        }
        added
    }
}

/// A single point of a rollup time series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupPoint {
    pub bucket_start: DateTime<Utc>,
    pub count: u64,
}
