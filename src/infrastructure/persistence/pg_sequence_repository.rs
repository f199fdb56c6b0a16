//! PostgreSQL implementation of the global id sequence.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::repositories::SequenceRepository;
use crate::error::{AppError, from_db_int, to_db_int};

/// The counter is the single row of `global_id_sequence`.
///
/// Increment-and-fetch is one `UPDATE ... RETURNING`, so the row lock makes
/// concurrent reservations from any number of processes disjoint.
pub struct PgSequenceRepository {
    pool: Arc<PgPool>,
}

impl PgSequenceRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceRepository for PgSequenceRepository {
    async fn increment_and_fetch(&self, amount: u64) -> Result<u64, AppError> {
        let end: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE global_id_sequence
            SET next_block_start = next_block_start + $1
            WHERE id = 1
            RETURNING next_block_start
            "#,
        )
        .bind(to_db_int(amount)?)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let end = end.ok_or_else(|| AppError::storage("global_id_sequence row is missing"))?;
        from_db_int(end)
    }

    async fn current(&self) -> Result<u64, AppError> {
        let value: i64 =
            sqlx::query_scalar("SELECT next_block_start FROM global_id_sequence WHERE id = 1")
                .fetch_one(self.pool.as_ref())
                .await?;

        from_db_int(value)
    }
}
