//! PostgreSQL implementation of link totals, summaries and expiry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{LinkSummary, RollupDelta, SystemTotals};
use crate::domain::repositories::LinkRepository;
use crate::error::{AppError, from_db_int};
use crate::infrastructure::persistence::pg_rollup_repository::DeltaBinds;

type SummaryRow = (String, String, DateTime<Utc>, Option<DateTime<Utc>>, i64);

fn into_summary(row: SummaryRow) -> Result<LinkSummary, AppError> {
    let (code, long_url, created_at, expires_at, total) = row;
    Ok(LinkSummary {
        code,
        long_url,
        created_at,
        expires_at,
        total_clicks: from_db_int(total)?,
    })
}

/// PostgreSQL repository over the `links` table.
pub struct PgLinkRepository {
    pool: Arc<PgPool>,
}

impl PgLinkRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn increment_total_clicks(
        &self,
        code: &str,
        delta: &RollupDelta,
    ) -> Result<bool, AppError> {
        let Some(binds) = DeltaBinds::from_delta(delta)? else {
            return Ok(self.find_summary(code).await?.is_some());
        };

        let result = sqlx::query(
            r#"
            UPDATE links SET
                total_click_count = total_click_count + (
                    SELECT COUNT(*)
                    FROM UNNEST($4::BIGINT[], $5::BIGINT[]) AS e(ms, seq)
                    WHERE total_applied_ms IS NULL
                       OR (e.ms, e.seq) > (total_applied_ms, total_applied_seq)
                ),
                total_applied_ms = CASE
                    WHEN total_applied_ms IS NULL
                      OR ($2::BIGINT, $3::BIGINT) > (total_applied_ms, total_applied_seq)
                    THEN $2 ELSE total_applied_ms END,
                total_applied_seq = CASE
                    WHEN total_applied_ms IS NULL
                      OR ($2::BIGINT, $3::BIGINT) > (total_applied_ms, total_applied_seq)
                    THEN $3 ELSE total_applied_seq END
            WHERE code = $1
            "#,
        )
        .bind(code)
        .bind(binds.high_ms)
        .bind(binds.high_seq)
        .bind(binds.ms)
        .bind(binds.seq)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM links WHERE expires_at IS NOT NULL AND expires_at < $1")
            .bind(now)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_summary(&self, code: &str) -> Result<Option<LinkSummary>, AppError> {
        let row: Option<SummaryRow> = sqlx::query_as(
            r#"
            SELECT code, long_url, created_at, expires_at, total_click_count
            FROM links
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(into_summary).transpose()
    }

    async fn top_by_clicks(&self, limit: u32) -> Result<Vec<LinkSummary>, AppError> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT code, long_url, created_at, expires_at, total_click_count
            FROM links
            ORDER BY total_click_count DESC, code ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(into_summary).collect()
    }

    async fn totals(&self) -> Result<SystemTotals, AppError> {
        let (links, clicks): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_click_count), 0)::BIGINT FROM links",
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(SystemTotals {
            total_links: from_db_int(links)?,
            total_clicks: from_db_int(clicks)?,
        })
    }
}
