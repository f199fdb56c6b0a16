//! Repository trait for cluster-wide scheduler locks.

use crate::domain::entities::{Lease, LockPolicy};
use crate::error::AppError;
use async_trait::async_trait;

/// Named, leased mutual exclusion shared by every worker instance.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLockRepository`] - PostgreSQL lock table
/// - [`crate::infrastructure::memory::MemoryLockRepository`] - In-process table
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Takes the lock if it is free or its previous lease ran past `max_hold`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(lease))` when acquired
    /// - `Ok(None)` when another holder has it (busy is not an error)
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn try_acquire(&self, name: &str, policy: &LockPolicy)
    -> Result<Option<Lease>, AppError>;

    /// Releases a lease, keeping the lock until `acquired_at + min_hold`.
    ///
    /// Releasing a lease that was already taken over is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn release(&self, lease: &Lease) -> Result<(), AppError>;
}
