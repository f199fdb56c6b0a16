use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::device_class::DeviceClass;
use crate::domain::entities::{
    AppliedCount, Granularity, LinkSummary, RollupBucket, RollupDelta, RollupPoint, SystemTotals,
};
use crate::domain::repositories::{LinkRepository, RollupRepository};
use crate::error::AppError;

#[derive(Debug)]
struct LinkRecord {
    long_url: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    total: AppliedCount,
    rollups: BTreeMap<RollupBucket, AppliedCount>,
}

impl LinkRecord {
    fn summary(&self, code: &str) -> LinkSummary {
        LinkSummary {
            code: code.to_string(),
            long_url: self.long_url.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            total_clicks: self.total.count,
        }
    }
}

/// In-process links with their totals and rollup rows.
///
/// Serves as both [`LinkRepository`] and [`RollupRepository`]. Rollups live
/// inside their link, so deleting a link drops its rollups too.
#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    links: Mutex<HashMap<String, LinkRecord>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a link with a zero total.
    pub async fn insert_link(
        &self,
        code: impl Into<String>,
        long_url: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.links.lock().await.insert(
            code.into(),
            LinkRecord {
                long_url: long_url.into(),
                created_at,
                expires_at,
                total: AppliedCount::default(),
                rollups: BTreeMap::new(),
            },
        );
    }

    pub async fn contains(&self, code: &str) -> bool {
        self.links.lock().await.contains_key(code)
    }

    /// Count stored for one rollup row, `None` if the row doesn't exist.
    pub async fn rollup_count(&self, code: &str, bucket: &RollupBucket) -> Option<u64> {
        self.links
            .lock()
            .await
            .get(code)
            .and_then(|link| link.rollups.get(bucket))
            .map(|row| row.count)
    }

    pub async fn total_clicks(&self, code: &str) -> Option<u64> {
        self.links.lock().await.get(code).map(|link| link.total.count)
    }
}

#[async_trait]
impl LinkRepository for MemoryLinkStore {
    async fn increment_total_clicks(
        &self,
        code: &str,
        delta: &RollupDelta,
    ) -> Result<bool, AppError> {
        let mut links = self.links.lock().await;
        match links.get_mut(code) {
            Some(link) => {
                link.total.apply(delta);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut links = self.links.lock().await;
        let before = links.len();
        links.retain(|_, link| !link.expires_at.is_some_and(|e| e < now));
        Ok((before - links.len()) as u64)
    }

    async fn find_summary(&self, code: &str) -> Result<Option<LinkSummary>, AppError> {
        Ok(self.links.lock().await.get(code).map(|l| l.summary(code)))
    }

    async fn top_by_clicks(&self, limit: u32) -> Result<Vec<LinkSummary>, AppError> {
        let links = self.links.lock().await;
        let mut summaries: Vec<LinkSummary> = links
            .iter()
            .map(|(code, link)| link.summary(code))
            .collect();

        summaries.sort_by(|a, b| {
            b.total_clicks
                .cmp(&a.total_clicks)
                .then_with(|| a.code.cmp(&b.code))
        });
        summaries.truncate(limit as usize);
        Ok(summaries)
    }

    async fn totals(&self) -> Result<SystemTotals, AppError> {
        let links = self.links.lock().await;
        Ok(SystemTotals {
            total_links: links.len() as u64,
            total_clicks: links.values().map(|l| l.total.count).sum(),
        })
    }
}

#[async_trait]
impl RollupRepository for MemoryLinkStore {
    async fn upsert(
        &self,
        code: &str,
        bucket: &RollupBucket,
        delta: &RollupDelta,
    ) -> Result<bool, AppError> {
        let mut links = self.links.lock().await;
        let Some(link) = links.get_mut(code) else {
            return Ok(false);
        };

        link.rollups.entry(*bucket).or_default().apply(delta);
        Ok(true)
    }

    async fn series(
        &self,
        code: &str,
        granularity: Granularity,
        device: Option<DeviceClass>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RollupPoint>, AppError> {
        let links = self.links.lock().await;
        let Some(link) = links.get(code) else {
            return Ok(Vec::new());
        };

        Ok(link
            .rollups
            .iter()
            .filter(|(bucket, _)| {
                bucket.granularity == granularity
                    && bucket.device == device
                    && bucket.start >= from
                    && bucket.start <= to
            })
            .map(|(bucket, row)| RollupPoint {
                bucket_start: bucket.start,
                count: row.count,
            })
            .collect())
    }

    async fn device_totals(
        &self,
        code: &str,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(DeviceClass, u64)>, AppError> {
        let links = self.links.lock().await;
        let Some(link) = links.get(code) else {
            return Ok(Vec::new());
        };

        let mut sums: BTreeMap<DeviceClass, u64> = BTreeMap::new();
        for (bucket, row) in &link.rollups {
            if bucket.granularity != granularity || bucket.start < from || bucket.start > to {
                continue;
            }
            if let Some(device) = bucket.device {
                *sums.entry(device).or_default() += row.count;
            }
        }

        Ok(sums.into_iter().collect())
    }
}
