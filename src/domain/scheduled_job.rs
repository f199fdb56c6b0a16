//! Contract for work run under a cluster-wide lease.

use crate::domain::entities::Lease;
use crate::error::AppError;
use async_trait::async_trait;

/// A periodic job that must not run on two instances at once.
///
/// The scheduler acquires the lock named by [`Self::lock_name`] and hands the
/// lease to [`Self::run`]. Jobs check the lease before every external write.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn lock_name(&self) -> &'static str;

    async fn run(&self, lease: &Lease) -> Result<(), AppError>;
}
