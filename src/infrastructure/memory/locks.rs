use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::entities::{Lease, LockPolicy};
use crate::domain::repositories::LockRepository;
use crate::error::AppError;

#[derive(Debug, Clone)]
struct LockRow {
    holder: String,
    locked_at: Instant,
    lock_until: Instant,
}

/// In-process lock table on the tokio clock, so paused-time tests can drive
/// lease expiry.
#[derive(Debug, Default)]
pub struct MemoryLockRepository {
    rows: Mutex<HashMap<String, LockRow>>,
}

impl MemoryLockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while some holder keeps the lock, including the min-hold tail
    /// after release.
    pub async fn is_locked(&self, name: &str) -> bool {
        self.rows
            .lock()
            .await
            .get(name)
            .is_some_and(|row| row.lock_until > Instant::now())
    }
}

#[async_trait]
impl LockRepository for MemoryLockRepository {
    async fn try_acquire(
        &self,
        name: &str,
        policy: &LockPolicy,
    ) -> Result<Option<Lease>, AppError> {
        let requested_at = Instant::now();
        let mut rows = self.rows.lock().await;

        if rows
            .get(name)
            .is_some_and(|row| row.lock_until > requested_at)
        {
            return Ok(None);
        }

        let holder = Uuid::new_v4().to_string();
        rows.insert(
            name.to_string(),
            LockRow {
                holder: holder.clone(),
                locked_at: requested_at,
                lock_until: requested_at + policy.max_hold,
            },
        );

        Ok(Some(Lease::new(
            name,
            holder,
            Utc::now(),
            *policy,
            requested_at,
        )))
    }

    async fn release(&self, lease: &Lease) -> Result<(), AppError> {
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get_mut(&lease.name)
            && row.holder == lease.holder
        {
            row.lock_until = (row.locked_at + lease.policy.min_hold).max(Instant::now());
        }
        Ok(())
    }
}
