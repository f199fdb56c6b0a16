//! Reservation of id blocks from the global sequence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entities::BlockRange;
use crate::domain::repositories::SequenceRepository;
use crate::error::AppError;
use crate::utils::deadline::bounded;

/// Hands out disjoint id ranges to code generators.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlockAllocator: Send + Sync {
    /// Reserves `size` consecutive ids no other caller will ever receive.
    ///
    /// # Errors
    ///
    /// - [`AppError::Allocation`] if the size is zero, the counter store
    ///   failed or returned an inconsistent value, or the code space is used up
    /// - [`AppError::Timeout`] if the store did not answer in time
    async fn reserve_block(&self, size: u32) -> Result<BlockRange, AppError>;
}

/// [`BlockAllocator`] backed by one atomic increment of the shared counter.
///
/// The counter value after the increment is the exclusive end of the block,
/// so the block is `[end - size, end)`. Ranges are never made up locally.
pub struct SequenceBlockAllocator<R: SequenceRepository> {
    repository: Arc<R>,
    timeout: Duration,
}

impl<R: SequenceRepository> SequenceBlockAllocator<R> {
    pub fn new(repository: Arc<R>, timeout: Duration) -> Self {
        Self {
            repository,
            timeout,
        }
    }
}

#[async_trait]
impl<R: SequenceRepository> BlockAllocator for SequenceBlockAllocator<R> {
    async fn reserve_block(&self, size: u32) -> Result<BlockRange, AppError> {
        if size == 0 {
            return Err(AppError::allocation("block size must be positive"));
        }
        let size = u64::from(size);

        let end = bounded(
            "sequence increment",
            self.timeout,
            self.repository.increment_and_fetch(size),
        )
        .await
        .map_err(|e| e.map_storage(AppError::allocation))?;

        let block = BlockRange::ending_at(end, size)?;

        metrics::counter!("id_blocks_reserved_total").increment(1);
        tracing::debug!(start = block.start, end = block.end, "Reserved id block");

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockSequenceRepository;
    use crate::utils::id_shuffler::SPACE;
    use mockall::predicate::eq;

    fn allocator(repo: MockSequenceRepository) -> SequenceBlockAllocator<MockSequenceRepository> {
        SequenceBlockAllocator::new(Arc::new(repo), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_reserve_block_uses_counter_as_exclusive_end() {
        let mut repo = MockSequenceRepository::new();
        repo.expect_increment_and_fetch()
            .with(eq(1000))
            .times(1)
            .returning(|_| Ok(3000));

        let block = allocator(repo).reserve_block(1000).await.unwrap();

        assert_eq!(block, BlockRange::new(2000, 3000));
    }

    #[tokio::test]
    async fn test_zero_size_is_rejected_without_store_call() {
        let mut repo = MockSequenceRepository::new();
        repo.expect_increment_and_fetch().never();

        let err = allocator(repo).reserve_block(0).await.unwrap_err();

        assert!(matches!(err, AppError::Allocation { .. }));
    }

    #[tokio::test]
    async fn test_store_failure_becomes_allocation_error() {
        let mut repo = MockSequenceRepository::new();
        repo.expect_increment_and_fetch()
            .returning(|_| Err(AppError::storage("connection refused")));

        let err = allocator(repo).reserve_block(10).await.unwrap_err();

        assert!(matches!(err, AppError::Allocation { ref message } if message == "connection refused"));
    }

    #[tokio::test]
    async fn test_inconsistent_counter_is_rejected() {
        let mut repo = MockSequenceRepository::new();
        repo.expect_increment_and_fetch().returning(|_| Ok(5));

        let err = allocator(repo).reserve_block(10).await.unwrap_err();

        assert!(matches!(err, AppError::Allocation { .. }));
    }

    #[tokio::test]
    async fn test_exhausted_space_never_wraps() {
        let mut repo = MockSequenceRepository::new();
        repo.expect_increment_and_fetch()
            .returning(|n| Ok(SPACE + n));

        let err = allocator(repo).reserve_block(10).await.unwrap_err();
        assert!(matches!(err, AppError::Allocation { .. }));

        let mut repo = MockSequenceRepository::new();
        repo.expect_increment_and_fetch().returning(|_| Ok(SPACE));
        let last = allocator(repo).reserve_block(10).await.unwrap();
        assert_eq!(last, BlockRange::new(SPACE - 10, SPACE));
    }

    struct StalledSequence;

    #[async_trait]
    impl SequenceRepository for StalledSequence {
        async fn increment_and_fetch(&self, _amount: u64) -> Result<u64, AppError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        }

        async fn current(&self) -> Result<u64, AppError> {
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let allocator = SequenceBlockAllocator::new(Arc::new(StalledSequence), Duration::from_millis(500));

        let err = allocator.reserve_block(10).await.unwrap_err();

        assert!(err.is_timeout());
    }
}
