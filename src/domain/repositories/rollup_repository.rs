//! Repository trait for hourly and daily click rollups.

use crate::domain::device_class::DeviceClass;
use crate::domain::entities::{Granularity, RollupBucket, RollupDelta, RollupPoint};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage for per-link click rollups.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgRollupRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::memory::MemoryLinkStore`] - Rollups kept inside in-process links
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RollupRepository: Send + Sync {
    /// Creates the row for `(code, bucket)` at zero if missing, then adds the
    /// delta's events that are newer than the row's applied watermark.
    ///
    /// Replaying a delta that was already applied adds nothing.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the link exists and the row was written
    /// - `Ok(false)` if no link has this code (the delta is dropped)
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn upsert(
        &self,
        code: &str,
        bucket: &RollupBucket,
        delta: &RollupDelta,
    ) -> Result<bool, AppError>;

    /// Returns the rollup series for a code in `[from, to]`, oldest first.
    ///
    /// `device = None` reads the base rollup.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn series(
        &self,
        code: &str,
        granularity: Granularity,
        device: Option<DeviceClass>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RollupPoint>, AppError>;

    /// Sums the device-keyed rollups of a code in `[from, to]` per class.
    ///
    /// Empty when device tracking was never enabled.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn device_totals(
        &self,
        code: &str,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(DeviceClass, u64)>, AppError>;
}
