//! Id blocks reserved from the global sequence.

use crate::error::AppError;
use crate::utils::id_shuffler::SPACE;

/// A contiguous range `[start, end)` reserved for one generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    /// Unchecked; ranges read back from the counter go through [`Self::ending_at`].
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// The block of `size` ids whose exclusive end is the counter value `end`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Allocation`] if the size is zero, the counter is
    /// below the size, or the block reaches past the code space.
    pub fn ending_at(end: u64, size: u64) -> Result<Self, AppError> {
        if size == 0 {
            return Err(AppError::allocation("block size must be positive"));
        }
        if end < size {
            return Err(AppError::allocation(format!(
                "counter returned {end}, below the requested block size {size}"
            )));
        }
        if end > SPACE {
            return Err(AppError::allocation(format!(
                "code space exhausted: block end {end} exceeds {SPACE}"
            )));
        }
        Ok(Self::new(end - size, end))
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The cursor over a generator's current block.
///
/// Owned exclusively by one generator and never persisted: a restart simply
/// reserves a fresh block, abandoning the unused tail of the old one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatedBlock {
    cursor: u64,
    block_end: u64,
}

impl AllocatedBlock {
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn block_end(&self) -> u64 {
        self.block_end
    }

    /// A block is exhausted once the cursor reaches its end; a fresh
    /// (default) block starts exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.block_end
    }

    /// Number of ids left before the next reservation.
    pub fn remaining(&self) -> u64 {
        self.block_end.saturating_sub(self.cursor)
    }

    /// Takes the next id. Callers must check [`Self::is_exhausted`] first.
    pub fn take(&mut self) -> Option<u64> {
        if self.is_exhausted() {
            return None;
        }
        let id = self.cursor;
        self.cursor += 1;
        Some(id)
    }
}

impl From<BlockRange> for AllocatedBlock {
    fn from(range: BlockRange) -> Self {
        Self {
            cursor: range.start,
            block_end: range.end,
        }
    }
}
