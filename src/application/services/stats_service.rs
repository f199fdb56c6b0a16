//! Click statistics read from rollups and link totals.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::device_class::DeviceClass;
use crate::domain::entities::{Granularity, LinkSummary, RollupPoint, SystemTotals};
use crate::domain::repositories::{LinkRepository, RollupRepository};
use crate::error::AppError;

/// Statistics for one short code over a time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlStats {
    pub link: LinkSummary,
    pub granularity: Granularity,
    pub points: Vec<RollupPoint>,
}

impl UrlStats {
    /// Clicks in the requested range, as opposed to the all-time total.
    pub fn clicks_in_range(&self) -> u64 {
        self.points.iter().map(|p| p.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSummary {
    pub totals: SystemTotals,
    pub top_links: Vec<LinkSummary>,
}

/// Service for reading click statistics.
///
/// Everything here comes from precomputed rollups and totals, so reads cost
/// the same no matter how many raw clicks a link received.
pub struct StatsService<K: LinkRepository, R: RollupRepository> {
    links: Arc<K>,
    rollups: Arc<R>,
}

impl<K: LinkRepository, R: RollupRepository> StatsService<K, R> {
    pub fn new(links: Arc<K>, rollups: Arc<R>) -> Self {
        Self { links, rollups }
    }

    /// Retrieves the link summary and its base rollup series in `[from, to]`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link matches the code.
    /// Returns [`AppError::Storage`] on store errors.
    pub async fn url_stats(
        &self,
        code: &str,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<UrlStats, AppError> {
        let link = self.find_link(code).await?;
        let points = self
            .rollups
            .series(code, granularity, None, from, to)
            .await?;

        Ok(UrlStats {
            link,
            granularity,
            points,
        })
    }

    /// Counts links and clicks system-wide and lists the `top_n` links.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    pub async fn system_summary(&self, top_n: u32) -> Result<SystemSummary, AppError> {
        let totals = self.links.totals().await?;
        let top_links = self.links.top_by_clicks(top_n).await?;

        Ok(SystemSummary { totals, top_links })
    }

    /// Clicks per device class in `[from, to]`.
    ///
    /// Every class is listed, with zero where nothing was recorded. All zeros
    /// when device tracking is off.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link matches the code.
    /// Returns [`AppError::Storage`] on store errors.
    pub async fn device_breakdown(
        &self,
        code: &str,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(DeviceClass, u64)>, AppError> {
        self.find_link(code).await?;
        let recorded = self
            .rollups
            .device_totals(code, granularity, from, to)
            .await?;

        Ok(DeviceClass::ALL
            .iter()
            .map(|class| {
                let count = recorded
                    .iter()
                    .find(|(c, _)| c == class)
                    .map_or(0, |(_, n)| *n);
                (*class, count)
            })
            .collect())
    }

    async fn find_link(&self, code: &str) -> Result<LinkSummary, AppError> {
        self.links
            .find_summary(code)
            .await?
            .ok_or_else(|| AppError::not_found(format!("no link with code '{code}'")))
    }
}
