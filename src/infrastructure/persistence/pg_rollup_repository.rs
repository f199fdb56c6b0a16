//! PostgreSQL implementation of hourly and daily click rollups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::device_class::DeviceClass;
use crate::domain::entities::rollup::BASE_DEVICE_LABEL;
use crate::domain::entities::{Granularity, RollupBucket, RollupDelta, RollupPoint};
use crate::domain::repositories::RollupRepository;
use crate::error::{AppError, from_db_int, to_db_int};

/// The statements for one rollup table.
///
/// Hourly buckets are `TIMESTAMPTZ`; daily buckets are `DATE` in UTC, so the
/// daily statements convert at the SQL boundary and the Rust side always
/// speaks `DateTime<Utc>`.
struct RollupTable {
    upsert: &'static str,
    series: &'static str,
    device_totals: &'static str,
}

// Bind order for upsert: code, bucket, device, count, high ms, high seq,
// ms[], seq[]. A new row takes the whole delta; an existing row only adds the
// ids past its watermark and keeps the larger watermark.
const HOURLY: RollupTable = RollupTable {
    upsert: r#"
        INSERT INTO url_hourly_clicks AS r
            (link_id, bucket, device_class, count, applied_ms, applied_seq)
        SELECT l.id, $2, $3, $4, $5, $6
        FROM links l
        WHERE l.code = $1
        ON CONFLICT (link_id, bucket, device_class) DO UPDATE SET
            count = r.count + (
                SELECT COUNT(*)
                FROM UNNEST($7::BIGINT[], $8::BIGINT[]) AS e(ms, seq)
                WHERE r.applied_ms IS NULL
                   OR (e.ms, e.seq) > (r.applied_ms, r.applied_seq)
            ),
            applied_ms = CASE
                WHEN r.applied_ms IS NULL OR ($5, $6) > (r.applied_ms, r.applied_seq)
                THEN $5 ELSE r.applied_ms END,
            applied_seq = CASE
                WHEN r.applied_ms IS NULL OR ($5, $6) > (r.applied_ms, r.applied_seq)
                THEN $6 ELSE r.applied_seq END
        RETURNING 1
    "#,
    series: r#"
        SELECT r.bucket AS bucket_start, r.count
        FROM url_hourly_clicks r
        JOIN links l ON l.id = r.link_id
        WHERE l.code = $1
          AND r.device_class = $2
          AND r.bucket BETWEEN $3 AND $4
        ORDER BY r.bucket
    "#,
    device_totals: r#"
        SELECT r.device_class, SUM(r.count)::BIGINT
        FROM url_hourly_clicks r
        JOIN links l ON l.id = r.link_id
        WHERE l.code = $1
          AND r.device_class <> 'any'
          AND r.bucket BETWEEN $2 AND $3
        GROUP BY r.device_class
    "#,
};

const DAILY: RollupTable = RollupTable {
    upsert: r#"
        INSERT INTO url_daily_clicks AS r
            (link_id, bucket, device_class, count, applied_ms, applied_seq)
        SELECT l.id, ($2::TIMESTAMPTZ AT TIME ZONE 'UTC')::DATE, $3, $4, $5, $6
        FROM links l
        WHERE l.code = $1
        ON CONFLICT (link_id, bucket, device_class) DO UPDATE SET
            count = r.count + (
                SELECT COUNT(*)
                FROM UNNEST($7::BIGINT[], $8::BIGINT[]) AS e(ms, seq)
                WHERE r.applied_ms IS NULL
                   OR (e.ms, e.seq) > (r.applied_ms, r.applied_seq)
            ),
            applied_ms = CASE
                WHEN r.applied_ms IS NULL OR ($5, $6) > (r.applied_ms, r.applied_seq)
                THEN $5 ELSE r.applied_ms END,
            applied_seq = CASE
                WHEN r.applied_ms IS NULL OR ($5, $6) > (r.applied_ms, r.applied_seq)
                THEN $6 ELSE r.applied_seq END
        RETURNING 1
    "#,
    series: r#"
        SELECT (r.bucket::TIMESTAMP AT TIME ZONE 'UTC') AS bucket_start, r.count
        FROM url_daily_clicks r
        JOIN links l ON l.id = r.link_id
        WHERE l.code = $1
          AND r.device_class = $2
          AND (r.bucket::TIMESTAMP AT TIME ZONE 'UTC') BETWEEN $3 AND $4
        ORDER BY r.bucket
    "#,
    device_totals: r#"
        SELECT r.device_class, SUM(r.count)::BIGINT
        FROM url_daily_clicks r
        JOIN links l ON l.id = r.link_id
        WHERE l.code = $1
          AND r.device_class <> 'any'
          AND (r.bucket::TIMESTAMP AT TIME ZONE 'UTC') BETWEEN $2 AND $3
        GROUP BY r.device_class
    "#,
};

fn table(granularity: Granularity) -> &'static RollupTable {
    match granularity {
        Granularity::Hour => &HOURLY,
        Granularity::Day => &DAILY,
    }
}

/// Splits a delta into the binds the watermark statements take.
pub(crate) struct DeltaBinds {
    pub count: i64,
    pub high_ms: i64,
    pub high_seq: i64,
    pub ms: Vec<i64>,
    pub seq: Vec<i64>,
}

impl DeltaBinds {
    /// `None` for an empty delta, which has nothing to write.
    pub fn from_delta(delta: &RollupDelta) -> Result<Option<Self>, AppError> {
        let Some(high) = delta.high_water() else {
            return Ok(None);
        };

        let (ms, seq) = delta.columns();
        Ok(Some(Self {
            count: to_db_int(delta.count())?,
            high_ms: to_db_int(high.millis)?,
            high_seq: to_db_int(high.seq)?,
            ms: ms.into_iter().map(to_db_int).collect::<Result<_, _>>()?,
            seq: seq.into_iter().map(to_db_int).collect::<Result<_, _>>()?,
        }))
    }
}

pub struct PgRollupRepository {
    pool: Arc<PgPool>,
}

impl PgRollupRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn link_exists(&self, code: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM links WHERE code = $1)")
            .bind(code)
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl RollupRepository for PgRollupRepository {
    async fn upsert(
        &self,
        code: &str,
        bucket: &RollupBucket,
        delta: &RollupDelta,
    ) -> Result<bool, AppError> {
        let Some(binds) = DeltaBinds::from_delta(delta)? else {
            return self.link_exists(code).await;
        };

        let written: Option<i32> = sqlx::query_scalar(table(bucket.granularity).upsert)
            .bind(code)
            .bind(bucket.start)
            .bind(bucket.device_label())
            .bind(binds.count)
            .bind(binds.high_ms)
            .bind(binds.high_seq)
            .bind(binds.ms)
            .bind(binds.seq)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(written.is_some())
    }

    async fn series(
        &self,
        code: &str,
        granularity: Granularity,
        device: Option<DeviceClass>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RollupPoint>, AppError> {
        let label = device.map_or(BASE_DEVICE_LABEL, |d| d.as_str());

        let rows: Vec<(DateTime<Utc>, i64)> = sqlx::query_as(table(granularity).series)
            .bind(code)
            .bind(label)
            .bind(from)
            .bind(to)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter()
            .map(|(bucket_start, count)| {
                Ok(RollupPoint {
                    bucket_start,
                    count: from_db_int(count)?,
                })
            })
            .collect()
    }

    async fn device_totals(
        &self,
        code: &str,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(DeviceClass, u64)>, AppError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(table(granularity).device_totals)
            .bind(code)
            .bind(from)
            .bind(to)
            .fetch_all(self.pool.as_ref())
            .await?;

        let mut totals = Vec::with_capacity(rows.len());
        for (label, count) in rows {
            match label.parse::<DeviceClass>() {
                Ok(class) => totals.push((class, from_db_int(count)?)),
                Err(_) => tracing::warn!(device_class = %label, "Ignoring unknown device class"),
            }
        }
        totals.sort_by_key(|(class, _)| *class);

        Ok(totals)
    }
}
