#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tinyurl_core::application::scheduler::JobScheduler;
use tinyurl_core::application::services::{ClickEmitter, StatsService};
use tinyurl_core::domain::click_worker::{AggregationWorker, WorkerConfig};
use tinyurl_core::domain::device_class::DeviceClass;
use tinyurl_core::domain::entities::{
    Granularity, LockPolicy, RollupBucket, RollupDelta, RollupPoint,
};
use tinyurl_core::domain::repositories::{ClickLog, RollupRepository};
use tinyurl_core::error::AppError;
use tinyurl_core::infrastructure::memory::{MemoryClickLog, MemoryLinkStore, MemoryLockRepository};

pub const GROUP: &str = "click_processors";

pub const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const PHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap()
}

pub fn hour(ts: DateTime<Utc>) -> RollupBucket {
    RollupBucket::containing(Granularity::Hour, ts)
}

pub fn day(ts: DateTime<Utc>) -> RollupBucket {
    RollupBucket::containing(Granularity::Day, ts)
}

pub fn worker_config(track_devices: bool) -> WorkerConfig {
    WorkerConfig {
        group: GROUP.to_string(),
        consumer: "processor-1".to_string(),
        batch_size: 10_000,
        track_devices,
        op_timeout: Duration::from_secs(5),
    }
}

/// No min hold, so back-to-back ticks can reacquire.
pub fn eager_policy() -> LockPolicy {
    LockPolicy {
        max_hold: Duration::from_secs(300),
        min_hold: Duration::ZERO,
    }
}

pub type MemoryWorker<R> = AggregationWorker<MemoryClickLog, R, MemoryLinkStore>;

/// Emitter, log, stores and scheduler wired together in memory.
pub struct Pipeline {
    pub log: Arc<MemoryClickLog>,
    pub links: Arc<MemoryLinkStore>,
    pub locks: Arc<MemoryLockRepository>,
    pub emitter: ClickEmitter<MemoryClickLog>,
    pub scheduler: JobScheduler<MemoryLockRepository>,
    pub stats: StatsService<MemoryLinkStore, MemoryLinkStore>,
}

impl Pipeline {
    pub async fn new(policy: LockPolicy) -> Self {
        let log = Arc::new(MemoryClickLog::new());
        log.ensure_group(GROUP).await.unwrap();

        let links = Arc::new(MemoryLinkStore::new());
        let locks = Arc::new(MemoryLockRepository::new());

        Self {
            emitter: ClickEmitter::new(log.clone(), Duration::from_millis(250)),
            scheduler: JobScheduler::new(locks.clone(), policy, Duration::from_secs(5)),
            stats: StatsService::new(links.clone(), links.clone()),
            log,
            links,
            locks,
        }
    }

    pub async fn add_link(&self, code: &str, expires_at: Option<DateTime<Utc>>) {
        self.links
            .insert_link(code, format!("https://example.com/{code}"), t0(), expires_at)
            .await;
    }

    /// Emits every click and waits until each has landed in the log.
    pub async fn click_all(&self, clicks: &[(&str, DateTime<Utc>, Option<&str>)]) {
        for (code, ts, ua) in clicks {
            self.emitter.emit(*code, *ts, *ua).await.unwrap();
        }
    }

    pub fn worker(&self, track_devices: bool) -> MemoryWorker<MemoryLinkStore> {
        self.worker_over(self.links.clone(), track_devices)
    }

    pub fn worker_over<R: RollupRepository>(
        &self,
        rollups: Arc<R>,
        track_devices: bool,
    ) -> MemoryWorker<R> {
        AggregationWorker::new(
            self.log.clone(),
            rollups,
            self.links.clone(),
            worker_config(track_devices),
        )
    }

    /// A worker reading under its own consumer name, like a second instance.
    pub fn worker_as<R: RollupRepository>(&self, consumer: &str, rollups: Arc<R>) -> MemoryWorker<R> {
        let config = WorkerConfig {
            consumer: consumer.to_string(),
            ..worker_config(false)
        };
        AggregationWorker::new(self.log.clone(), rollups, self.links.clone(), config)
    }
}

/// Rollup store that fails the first write for each listed code.
pub struct FailFirstWrite {
    inner: Arc<MemoryLinkStore>,
    armed: Mutex<HashSet<String>>,
}

impl FailFirstWrite {
    pub fn new(inner: Arc<MemoryLinkStore>, codes: &[&str]) -> Self {
        Self {
            inner,
            armed: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
        }
    }
}

#[async_trait]
impl RollupRepository for FailFirstWrite {
    async fn upsert(
        &self,
        code: &str,
        bucket: &RollupBucket,
        delta: &RollupDelta,
    ) -> Result<bool, AppError> {
        if self.armed.lock().await.remove(code) {
            return Err(AppError::storage("connection reset"));
        }
        self.inner.upsert(code, bucket, delta).await
    }

    async fn series(
        &self,
        code: &str,
        granularity: Granularity,
        device: Option<DeviceClass>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RollupPoint>, AppError> {
        self.inner.series(code, granularity, device, from, to).await
    }

    async fn device_totals(
        &self,
        code: &str,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(DeviceClass, u64)>, AppError> {
        self.inner.device_totals(code, granularity, from, to).await
    }
}
