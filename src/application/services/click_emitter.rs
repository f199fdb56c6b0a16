//! Fire-and-forget click emission from the redirect path.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::domain::click_event::ClickEvent;
use crate::domain::event_id::EventId;
use crate::domain::repositories::ClickLog;
use crate::error::AppError;
use crate::utils::deadline::bounded;

/// Appends click events to the log without blocking redirects.
///
/// Emission is best-effort: a failed or slow append drops the click and
/// bumps `clicks_dropped_total`; it never surfaces to the caller.
pub struct ClickEmitter<L: ClickLog> {
    log: Arc<L>,
    timeout: Duration,
}

impl<L: ClickLog> Clone for ClickEmitter<L> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            timeout: self.timeout,
        }
    }
}

impl<L: ClickLog + 'static> ClickEmitter<L> {
    pub fn new(log: Arc<L>, timeout: Duration) -> Self {
        Self { log, timeout }
    }

    /// Serializes and appends one event, waiting for the log to confirm.
    ///
    /// # Errors
    ///
    /// - [`AppError::Emit`] if serialization or the append failed
    /// - [`AppError::Timeout`] if the log did not confirm in time
    pub async fn try_emit(&self, event: &ClickEvent) -> Result<EventId, AppError> {
        let payload = event
            .to_payload()
            .map_err(|e| AppError::emit(e.to_string()))?;

        bounded("click append", self.timeout, self.log.append(&payload))
            .await
            .map_err(|e| e.map_storage(AppError::emit))
    }

    /// Records a click in the background and returns immediately.
    ///
    /// The returned handle is only useful to tests and shutdown code; the
    /// redirect path drops it.
    pub fn emit(
        &self,
        short_code: impl Into<String>,
        timestamp: DateTime<Utc>,
        device_hint: Option<&str>,
    ) -> JoinHandle<()> {
        let event = ClickEvent::new(short_code, timestamp, device_hint);
        let emitter = self.clone();

        tokio::spawn(async move {
            match emitter.try_emit(&event).await {
                Ok(id) => {
                    metrics::counter!("clicks_emitted_total").increment(1);
                    tracing::trace!(short_code = %event.short_code, event_id = %id, "Click emitted");
                }
                Err(e) => {
                    metrics::counter!("clicks_dropped_total").increment(1);
                    tracing::warn!(short_code = %event.short_code, error = %e, "Dropping click event");
                }
            }
        })
    }
}
