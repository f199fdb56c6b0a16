//! Short code generation from reserved id blocks.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::application::services::block_allocator::BlockAllocator;
use crate::domain::entities::AllocatedBlock;
use crate::error::AppError;
use crate::utils::base62;
use crate::utils::id_shuffler::shuffle;

/// Produces unique, non-sequential-looking short codes.
///
/// Ids come from the generator's current block. Only when that block is used
/// up does a call go back to the allocator, so under steady load at most one
/// store round-trip happens per `block_size` codes. Unused ids of a block are
/// lost on restart, which is fine since uniqueness is all that matters.
///
/// # Examples
///
/// ```ignore
/// let generator = ShortCodeGenerator::new(allocator, 1000);
/// generator.warm_up().await?;
/// let code = generator.generate().await?; // e.g. "k8mRho4"
/// ```
pub struct ShortCodeGenerator<A: BlockAllocator> {
    allocator: Arc<A>,
    block_size: u32,
    block: Mutex<AllocatedBlock>,
}

impl<A: BlockAllocator> ShortCodeGenerator<A> {
    /// Creates a generator with no block yet; the first call reserves one.
    pub fn new(allocator: Arc<A>, block_size: u32) -> Self {
        Self {
            allocator,
            block_size,
            block: Mutex::new(AllocatedBlock::default()),
        }
    }

    /// Reserves the first block up front so the first redirect-path call
    /// doesn't pay for the round-trip.
    ///
    /// # Errors
    ///
    /// See [`BlockAllocator::reserve_block`].
    pub async fn warm_up(&self) -> Result<(), AppError> {
        let mut block = self.block.lock().await;
        if block.is_exhausted() {
            *block = self.allocator.reserve_block(self.block_size).await?.into();
        }
        Ok(())
    }

    /// Returns the next sequential id, reserving a new block if needed.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's [`AppError::Allocation`] or
    /// [`AppError::Timeout`]. The current block is left untouched on failure.
    pub async fn next_id(&self) -> Result<u64, AppError> {
        let mut block = self.block.lock().await;

        if block.is_exhausted() {
            *block = self.allocator.reserve_block(self.block_size).await?.into();
        }

        block
            .take()
            .ok_or_else(|| AppError::allocation("allocator returned an empty block"))
    }

    /// Returns a fresh short code.
    ///
    /// # Errors
    ///
    /// See [`Self::next_id`].
    pub async fn generate(&self) -> Result<String, AppError> {
        let id = self.next_id().await?;
        Ok(base62::encode(shuffle(id)))
    }
}
