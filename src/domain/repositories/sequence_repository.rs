//! Repository trait for the global id sequence.

use crate::error::AppError;
use async_trait::async_trait;

/// The durable, process-wide counter that id blocks are carved from.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgSequenceRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::memory::MemorySequenceRepository`] - In-process counter
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SequenceRepository: Send + Sync {
    /// Atomically adds `amount` to the counter and returns the new value.
    ///
    /// Concurrent callers in any process must observe distinct results.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the update cannot be confirmed.
    async fn increment_and_fetch(&self, amount: u64) -> Result<u64, AppError>;

    /// Reads the counter without advancing it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn current(&self) -> Result<u64, AppError>;
}
