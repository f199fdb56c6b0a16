//! Periodic removal of expired links.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::entities::Lease;
use crate::domain::repositories::LinkRepository;
use crate::domain::scheduled_job::ScheduledJob;
use crate::error::AppError;
use crate::utils::deadline::bounded;

pub const CLEANUP_EXPIRED_LINKS_LOCK: &str = "cleanup_expired_links";

/// Deletes links whose expiry is in the past. Their rollups go with them.
pub struct CleanupWorker<K: LinkRepository> {
    links: Arc<K>,
    op_timeout: Duration,
}

impl<K: LinkRepository> CleanupWorker<K> {
    pub fn new(links: Arc<K>, op_timeout: Duration) -> Self {
        Self { links, op_timeout }
    }

    /// Deletes every link with `expires_at < now` and returns how many went.
    pub async fn cleanup(&self, lease: &Lease) -> Result<u64, AppError> {
        if lease.is_expired() {
            return Err(AppError::lock_expired(&lease.name));
        }

        let deleted = bounded(
            "expired link delete",
            self.op_timeout,
            self.links.delete_expired(Utc::now()),
        )
        .await?;

        metrics::counter!("expired_links_deleted_total").increment(deleted);
        Ok(deleted)
    }
}

#[async_trait]
impl<K: LinkRepository> ScheduledJob for CleanupWorker<K> {
    fn lock_name(&self) -> &'static str {
        CLEANUP_EXPIRED_LINKS_LOCK
    }

    async fn run(&self, lease: &Lease) -> Result<(), AppError> {
        let deleted = self.cleanup(lease).await?;
        if deleted > 0 {
            tracing::info!(deleted, "Removed expired links");
        }
        Ok(())
    }
}
