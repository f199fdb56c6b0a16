//! Lease-guarded aggregation of the click log into rollups and totals.
//!
//! One cycle walks `Idle -> ClaimingBatch -> Aggregating -> Persisting ->
//! Acknowledging -> Idle`. The batch is acknowledged only after every write
//! succeeded; any failure earlier leaves it pending, and the next cycle
//! replays it against the rollup watermarks without double counting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::click_aggregator::{ClickAggregate, decode_entries};
use crate::domain::entities::Lease;
use crate::domain::event_id::EventId;
use crate::domain::repositories::{ClickLog, LinkRepository, RollupRepository};
use crate::domain::scheduled_job::ScheduledJob;
use crate::error::AppError;
use crate::utils::deadline::bounded;

pub const PROCESS_CLICKS_LOCK: &str = "process_clicks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub group: String,
    pub consumer: String,
    pub batch_size: usize,
    pub track_devices: bool,
    pub op_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    ClaimingBatch,
    Aggregating,
    Persisting,
    Acknowledging,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries read from the log, rejected ones included.
    pub claimed: usize,
    /// Entries that decoded into clicks.
    pub aggregated: usize,
    /// Undecodable or deleted entries, acknowledged without counting.
    pub rejected: usize,
    pub rollups_written: usize,
    pub totals_written: usize,
    /// Codes whose link no longer exists; their clicks are dropped.
    pub unknown_codes: usize,
}

pub struct AggregationWorker<L: ClickLog, R: RollupRepository, K: LinkRepository> {
    log: Arc<L>,
    rollups: Arc<R>,
    links: Arc<K>,
    config: WorkerConfig,
}

impl<L: ClickLog, R: RollupRepository, K: LinkRepository> AggregationWorker<L, R, K> {
    pub fn new(log: Arc<L>, rollups: Arc<R>, links: Arc<K>, config: WorkerConfig) -> Self {
        Self {
            log,
            rollups,
            links,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Runs one claim-aggregate-persist-acknowledge cycle under `lease`.
    ///
    /// # Errors
    ///
    /// - [`AppError::LockExpired`] if the lease ran out before a write or the
    ///   acknowledgment; nothing is written after that point
    /// - [`AppError::Persist`] if a rollup or total write failed
    /// - [`AppError::Timeout`] if any store call exceeded the operation timeout
    /// - [`AppError::Storage`] if reading or acknowledging the log failed
    ///
    /// In every error case the batch stays pending for redelivery.
    pub async fn run_cycle(&self, lease: &Lease) -> Result<CycleReport, AppError> {
        let timeout = self.config.op_timeout;
        let mut report = CycleReport::default();

        enter(CyclePhase::ClaimingBatch);
        let entries = bounded(
            "click log read",
            timeout,
            self.log.read_pending(
                &self.config.group,
                &self.config.consumer,
                self.config.batch_size,
            ),
        )
        .await?;

        if entries.is_empty() {
            enter(CyclePhase::Idle);
            return Ok(report);
        }
        report.claimed = entries.len();

        enter(CyclePhase::Aggregating);
        let (clicks, rejected) = decode_entries(&entries);
        report.rejected = rejected.len();
        report.aggregated = clicks.len();
        let aggregate = ClickAggregate::fold(&clicks, self.config.track_devices);

        enter(CyclePhase::Persisting);
        for (code, contribution) in &aggregate.by_code {
            let mut link_exists = true;

            for (bucket, delta) in &contribution.rollups {
                guard(lease)?;
                let written = bounded("rollup upsert", timeout, self.rollups.upsert(code, bucket, delta))
                    .await
                    .map_err(|e| e.map_storage(AppError::persist))?;

                if !written {
                    link_exists = false;
                    break;
                }
                report.rollups_written += 1;
            }

            if !link_exists {
                tracing::debug!(short_code = %code, clicks = contribution.total.count(), "Dropping clicks for unknown short code");
                report.unknown_codes += 1;
                continue;
            }

            guard(lease)?;
            let written = bounded(
                "total click increment",
                timeout,
                self.links.increment_total_clicks(code, &contribution.total),
            )
            .await
            .map_err(|e| e.map_storage(AppError::persist))?;

            if written {
                report.totals_written += 1;
            } else {
                report.unknown_codes += 1;
            }
        }

        enter(CyclePhase::Acknowledging);
        guard(lease)?;
        let ids: Vec<EventId> = entries.iter().map(|e| e.id).collect();
        let acked = bounded(
            "click log acknowledge",
            timeout,
            self.log.acknowledge(&self.config.group, &ids),
        )
        .await?;

        if acked < ids.len() as u64 {
            tracing::debug!(claimed = ids.len(), acked, "Some entries were already acknowledged");
        }

        metrics::counter!("click_events_aggregated_total").increment(report.aggregated as u64);
        metrics::counter!("click_events_rejected_total").increment(report.rejected as u64);

        enter(CyclePhase::Idle);
        Ok(report)
    }
}

fn enter(phase: CyclePhase) {
    tracing::trace!(?phase, "Aggregation cycle phase");
}

fn guard(lease: &Lease) -> Result<(), AppError> {
    if lease.is_expired() {
        tracing::warn!(lock = %lease.name, "Lease expired mid-cycle, suppressing writes");
        return Err(AppError::lock_expired(&lease.name));
    }
    Ok(())
}

#[async_trait]
impl<L: ClickLog, R: RollupRepository, K: LinkRepository> ScheduledJob
    for AggregationWorker<L, R, K>
{
    fn lock_name(&self) -> &'static str {
        PROCESS_CLICKS_LOCK
    }

    async fn run(&self, lease: &Lease) -> Result<(), AppError> {
        let report = self.run_cycle(lease).await?;

        if report.claimed > 0 {
            tracing::info!(
                claimed = report.claimed,
                aggregated = report.aggregated,
                rejected = report.rejected,
                rollups = report.rollups_written,
                totals = report.totals_written,
                unknown_codes = report.unknown_codes,
                "Aggregated click batch"
            );
        }
        Ok(())
    }
}
