//! Repository trait for the link columns this crate owns.

use crate::domain::entities::{LinkSummary, RollupDelta, SystemTotals};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Access to link totals, summaries and expiry.
///
/// Link creation and lookup for redirects belong to the surrounding service.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::memory::MemoryLinkStore`] - In-process links
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Adds the delta's events newer than the link's applied watermark to its
    /// running total.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the link exists
    /// - `Ok(false)` if no link has this code
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn increment_total_clicks(&self, code: &str, delta: &RollupDelta)
    -> Result<bool, AppError>;

    /// Deletes links whose expiry is strictly before `now`.
    ///
    /// Returns the number of deleted links. Rollup rows go with them.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    /// Finds a link summary by short code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn find_summary(&self, code: &str) -> Result<Option<LinkSummary>, AppError>;

    /// Lists the links with the highest totals, highest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn top_by_clicks(&self, limit: u32) -> Result<Vec<LinkSummary>, AppError>;

    /// Counts links and sums all totals.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn totals(&self) -> Result<SystemTotals, AppError>;
}
