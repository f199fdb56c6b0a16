//! PostgreSQL implementation of leased scheduler locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::entities::{Lease, LockPolicy};
use crate::domain::repositories::LockRepository;
use crate::error::AppError;

fn millis(duration: Duration) -> Result<i64, AppError> {
    i64::try_from(duration.as_millis())
        .map_err(|_| AppError::storage(format!("lock duration {duration:?} is too long")))
}

/// Locks in `scheduler_locks`, one row per lock name.
///
/// A row is free once `lock_until` has passed. Acquisition is a conditional
/// upsert, so exactly one of several racing instances gets a row back. All
/// times come from the database clock.
pub struct PgLockRepository {
    pool: Arc<PgPool>,
}

impl PgLockRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockRepository for PgLockRepository {
    async fn try_acquire(
        &self,
        name: &str,
        policy: &LockPolicy,
    ) -> Result<Option<Lease>, AppError> {
        let requested_at = Instant::now();
        let holder = Uuid::new_v4().to_string();

        let locked_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            INSERT INTO scheduler_locks (name, lock_until, locked_at, locked_by)
            VALUES ($1, NOW() + $2::BIGINT * INTERVAL '1 millisecond', NOW(), $3)
            ON CONFLICT (name) DO UPDATE SET
                lock_until = EXCLUDED.lock_until,
                locked_at = EXCLUDED.locked_at,
                locked_by = EXCLUDED.locked_by
            WHERE scheduler_locks.lock_until <= NOW()
            RETURNING locked_at
            "#,
        )
        .bind(name)
        .bind(millis(policy.max_hold)?)
        .bind(&holder)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(locked_at.map(|at| Lease::new(name, holder, at, *policy, requested_at)))
    }

    async fn release(&self, lease: &Lease) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduler_locks
            SET lock_until = GREATEST(locked_at + $3::BIGINT * INTERVAL '1 millisecond', NOW())
            WHERE name = $1 AND locked_by = $2
            "#,
        )
        .bind(&lease.name)
        .bind(&lease.holder)
        .bind(millis(lease.policy.min_hold)?)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(lock = %lease.name, "Lock was taken over before release");
        }
        Ok(())
    }
}
