use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::domain::repositories::SequenceRepository;
use crate::error::AppError;

/// Process-local counter with the same increment-and-fetch contract as the
/// Postgres sequence row.
#[derive(Debug, Default)]
pub struct MemorySequenceRepository {
    value: AtomicU64,
}

impl MemorySequenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }
}

#[async_trait]
impl SequenceRepository for MemorySequenceRepository {
    async fn increment_and_fetch(&self, amount: u64) -> Result<u64, AppError> {
        let previous = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(amount))
            .map_err(|v| AppError::storage(format!("sequence overflow at {v}")))?;
        Ok(previous + amount)
    }

    async fn current(&self) -> Result<u64, AppError> {
        Ok(self.value.load(Ordering::SeqCst))
    }
}
