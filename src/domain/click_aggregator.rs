//! In-memory folding of a click batch into rollup deltas.
//!
//! A batch of N events turns into at most one delta per distinct
//! `(code, bucket)` plus one total per code, so writes scale with the number
//! of distinct keys rather than the number of clicks.

use std::collections::BTreeMap;

use crate::domain::click_event::ClickEvent;
use crate::domain::device_class::DeviceClass;
use crate::domain::entities::{Granularity, RollupBucket, RollupDelta};
use crate::domain::event_id::{EventId, StreamEntry};

/// A log entry whose payload decoded into a click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedClick {
    pub id: EventId,
    pub event: ClickEvent,
}

/// Splits raw entries into decoded clicks and the ids of entries that could
/// not be decoded.
pub fn decode_entries(entries: &[StreamEntry]) -> (Vec<DecodedClick>, Vec<EventId>) {
    let mut clicks = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();

    for entry in entries {
        let decoded = entry
            .payload
            .as_deref()
            .map(ClickEvent::from_payload);

        match decoded {
            Some(Ok(event)) => clicks.push(DecodedClick {
                id: entry.id,
                event,
            }),
            Some(Err(e)) => {
                tracing::warn!(event_id = %entry.id, error = %e, "Dropping undecodable click event");
                rejected.push(entry.id);
            }
            None => {
                tracing::warn!(event_id = %entry.id, "Dropping click event with no payload");
                rejected.push(entry.id);
            }
        }
    }

    (clicks, rejected)
}

/// Everything one batch contributes to a single short code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeClicks {
    pub total: RollupDelta,
    pub rollups: BTreeMap<RollupBucket, RollupDelta>,
}

/// A batch folded per short code, in code order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickAggregate {
    pub by_code: BTreeMap<String, CodeClicks>,
    pub events: usize,
}

impl ClickAggregate {
    /// Folds decoded clicks into hourly and daily base rollups and totals.
    ///
    /// With `track_devices`, each click also lands in the device-keyed hourly
    /// and daily buckets of its classified device. Those never feed the totals.
    pub fn fold(clicks: &[DecodedClick], track_devices: bool) -> Self {
        let mut aggregate = Self::default();

        for click in clicks {
            let entry = aggregate
                .by_code
                .entry(click.event.short_code.clone())
                .or_default();

            entry.total.push(click.id);

            let device = track_devices
                .then(|| DeviceClass::classify(click.event.device_hint.as_deref()));

            for granularity in [Granularity::Hour, Granularity::Day] {
                let base = RollupBucket::containing(granularity, click.event.timestamp);
                entry.rollups.entry(base).or_default().push(click.id);

                if let Some(device) = device {
                    entry
                        .rollups
                        .entry(base.with_device(device))
                        .or_default()
                        .push(click.id);
                }
            }

            aggregate.events += 1;
        }

        aggregate
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Number of distinct rollup keys across all codes.
    pub fn rollup_keys(&self) -> usize {
        self.by_code.values().map(|c| c.rollups.len()).sum()
    }
}
