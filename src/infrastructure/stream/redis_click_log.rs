//! Redis Streams implementation of the click log.

use async_trait::async_trait;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamPendingReply, StreamReadOptions,
    StreamReadReply,
};
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::{debug, info, warn};

use crate::domain::event_id::{EventId, StreamEntry};
use crate::domain::repositories::ClickLog;
use crate::error::AppError;

const PAYLOAD_FIELD: &str = "payload";

/// Click log on a single Redis stream.
///
/// Every click is one `XADD` entry with a `payload` field. A read first runs
/// `XAUTOCLAIM` with zero idle time over the group's whole pending list, so
/// entries another consumer left behind are taken over, and falls back to
/// `XREADGROUP >` for new entries only when nothing was pending.
pub struct RedisClickLog {
    conn: ConnectionManager,
    stream_key: String,
}

impl RedisClickLog {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the URL is invalid or Redis is unreachable.
    pub async fn connect(redis_url: &str, stream_key: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        let mut test_conn = manager.clone();
        test_conn.ping::<()>().await?;

        let stream_key = stream_key.into();
        info!(stream = %stream_key, "Connected to Redis click log");

        Ok(Self::new(manager, stream_key))
    }

    pub fn new(conn: ConnectionManager, stream_key: impl Into<String>) -> Self {
        Self {
            conn,
            stream_key: stream_key.into(),
        }
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        from: &str,
        max: usize,
    ) -> Result<Vec<StreamEntry>, AppError> {
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(max);

        let mut conn = self.conn.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[self.stream_key.as_str()], &[from], &options)
            .await?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for key in reply.keys {
            for raw in key.ids {
                let id: EventId = raw.id.parse()?;
                let payload = raw.get::<String>(PAYLOAD_FIELD);
                entries.push(StreamEntry { id, payload });
            }
        }
        entries.sort_by_key(|e| e.id);

        Ok(entries)
    }

    /// Takes over up to `max` pending entries of `group`, whoever holds them.
    async fn claim_pending(
        &self,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<StreamEntry>, AppError> {
        let options = StreamAutoClaimOptions::default().count(max);

        let mut conn = self.conn.clone();
        let reply: StreamAutoClaimReply = conn
            .xautoclaim_options(self.stream_key.as_str(), group, consumer, 0, "0-0", options)
            .await?;

        if reply.invalid_entries {
            warn!(stream = %self.stream_key, "Skipped pending entries that no longer exist");
        }

        let mut entries = Vec::with_capacity(reply.claimed.len() + reply.deleted_ids.len());
        for raw in reply.claimed {
            let id: EventId = raw.id.parse()?;
            let payload = raw.get::<String>(PAYLOAD_FIELD);
            entries.push(StreamEntry { id, payload });
        }
        // Redis drops these from the pending list itself; they are still
        // reported so the cycle counts them as rejected.
        for raw in reply.deleted_ids {
            entries.push(StreamEntry {
                id: raw.parse()?,
                payload: None,
            });
        }
        entries.sort_by_key(|e| e.id);
        entries.truncate(max);

        Ok(entries)
    }
}

#[async_trait]
impl ClickLog for RedisClickLog {
    async fn ensure_group(&self, group: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let created: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(&self.stream_key, group, "0")
            .await;

        match created {
            Ok(()) => {
                info!(stream = %self.stream_key, group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(stream = %self.stream_key, group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn append(&self, payload: &str) -> Result<EventId, AppError> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd(&self.stream_key, "*", &[(PAYLOAD_FIELD, payload)])
            .await?;

        id.parse()
    }

    async fn read_pending(
        &self,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<StreamEntry>, AppError> {
        let pending = self.claim_pending(group, consumer, max).await?;
        if !pending.is_empty() {
            debug!(count = pending.len(), "Redelivering pending click events");
            return Ok(pending);
        }

        self.read_group(group, consumer, ">", max).await
    }

    async fn acknowledge(&self, group: &str, ids: &[EventId]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let mut conn = self.conn.clone();
        let acked: u64 = conn.xack(&self.stream_key, group, &ids).await?;

        Ok(acked)
    }

    async fn pending_count(&self, group: &str) -> Result<u64, AppError> {
        let mut conn = self.conn.clone();
        let reply: StreamPendingReply = conn.xpending(&self.stream_key, group).await?;

        Ok(reply.count() as u64)
    }
}
