use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::event_id::{EventId, StreamEntry};
use crate::domain::repositories::ClickLog;
use crate::error::AppError;

#[derive(Debug, Default)]
struct GroupState {
    last_delivered: Option<EventId>,
    /// Delivered but unacknowledged ids and the consumer that holds them.
    pending: BTreeMap<EventId, String>,
}

#[derive(Debug, Default)]
struct LogState {
    last_id: Option<EventId>,
    entries: BTreeMap<EventId, String>,
    groups: HashMap<String, GroupState>,
}

impl LogState {
    fn next_id(&mut self) -> EventId {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let id = match self.last_id {
            Some(last) if last.millis >= now => EventId::new(last.millis, last.seq + 1),
            _ => EventId::new(now, 0),
        };
        self.last_id = Some(id);
        id
    }
}

/// In-process click log with Redis Streams consumer-group semantics.
///
/// Groups start from the beginning of the log. A read claims every pending
/// entry of the group, whichever consumer held it, before any new ones are
/// delivered. Entries removed with [`Self::delete`] come back with no payload
/// while still pending.
#[derive(Debug, Default)]
pub struct MemoryClickLog {
    state: Mutex<LogState>,
}

impl MemoryClickLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes an entry from the log without acknowledging it.
    pub async fn delete(&self, id: EventId) -> bool {
        self.state.lock().await.entries.remove(&id).is_some()
    }

    /// Number of entries still stored in the log.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }
}

#[async_trait]
impl ClickLog for MemoryClickLog {
    async fn ensure_group(&self, group: &str) -> Result<(), AppError> {
        self.state
            .lock()
            .await
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn append(&self, payload: &str) -> Result<EventId, AppError> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.entries.insert(id, payload.to_string());
        Ok(id)
    }

    async fn read_pending(
        &self,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<StreamEntry>, AppError> {
        let mut guard = self.state.lock().await;
        let LogState {
            entries, groups, ..
        } = &mut *guard;

        let state = groups
            .get_mut(group)
            .ok_or_else(|| AppError::storage(format!("no such consumer group '{group}'")))?;

        let redelivered: Vec<StreamEntry> = state
            .pending
            .iter_mut()
            .take(max)
            .map(|(id, owner)| {
                if owner.as_str() != consumer {
                    *owner = consumer.to_string();
                }
                StreamEntry {
                    id: *id,
                    payload: entries.get(id).cloned(),
                }
            })
            .collect();

        if !redelivered.is_empty() {
            return Ok(redelivered);
        }

        let fresh: Vec<StreamEntry> = match state.last_delivered {
            Some(last) => entries
                .range((std::ops::Bound::Excluded(last), std::ops::Bound::Unbounded))
                .take(max)
                .map(|(id, payload)| StreamEntry {
                    id: *id,
                    payload: Some(payload.clone()),
                })
                .collect(),
            None => entries
                .iter()
                .take(max)
                .map(|(id, payload)| StreamEntry {
                    id: *id,
                    payload: Some(payload.clone()),
                })
                .collect(),
        };

        for entry in &fresh {
            state.pending.insert(entry.id, consumer.to_string());
        }
        if let Some(last) = fresh.last() {
            state.last_delivered = Some(last.id);
        }

        Ok(fresh)
    }

    async fn acknowledge(&self, group: &str, ids: &[EventId]) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let Some(group_state) = state.groups.get_mut(group) else {
            return Ok(0);
        };

        let acked = ids
            .iter()
            .filter(|id| group_state.pending.remove(id).is_some())
            .count();
        Ok(acked as u64)
    }

    async fn pending_count(&self, group: &str) -> Result<u64, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .groups
            .get(group)
            .map_or(0, |g| g.pending.len() as u64))
    }
}
