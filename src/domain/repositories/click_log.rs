//! Trait for the durable click event log.

use crate::domain::event_id::{EventId, StreamEntry};
use crate::error::AppError;
use async_trait::async_trait;

/// An append-only, ordered log with consumer-group delivery.
///
/// Entries stay pending for a group until acknowledged. A read first takes
/// over whatever the group still has pending, from any consumer, and only
/// delivers new entries once nothing is pending.
///
/// # Implementations
///
/// - [`crate::infrastructure::stream::RedisClickLog`] - Redis Streams
/// - [`crate::infrastructure::memory::MemoryClickLog`] - In-process log
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClickLog: Send + Sync {
    /// Creates the consumer group if it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors other than "already exists".
    async fn ensure_group(&self, group: &str) -> Result<(), AppError>;

    /// Appends one payload and returns the id the log assigned to it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the append is not confirmed.
    async fn append(&self, payload: &str) -> Result<EventId, AppError>;

    /// Claims up to `max` entries for `consumer` within `group`.
    ///
    /// Entries delivered to any consumer of the group but not acknowledged
    /// are claimed for `consumer` and returned first, oldest first. New
    /// entries are only delivered when the group has nothing pending, so an
    /// id past a rollup watermark is never read while an older one is still
    /// outstanding. Callers must hold the group's processing lease, which is
    /// what makes taking over another consumer's entries safe.
    ///
    /// Results are in id order. Entries deleted from the log while pending
    /// come back without a payload.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn read_pending(
        &self,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<StreamEntry>, AppError>;

    /// Marks entries as processed for `group`. Returns how many were pending.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn acknowledge(&self, group: &str, ids: &[EventId]) -> Result<u64, AppError>;

    /// Number of delivered-but-unacknowledged entries for `group`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on store errors.
    async fn pending_count(&self, group: &str) -> Result<u64, AppError>;
}
