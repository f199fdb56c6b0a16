//! Click event model carried through the click log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A single redirect, as appended to the click log.
///
/// Events are created at redirect time, never mutated, and discarded once the
/// aggregation worker acknowledges them.
///
/// # Wire format
///
/// Stored as JSON in the `payload` field of one log entry:
///
/// ```json
/// {"shortCode":"k8mRho4","timestamp":"2024-01-01T10:15:00Z","deviceHint":"Mozilla/5.0 ..."}
/// ```
///
/// `deviceHint` is the raw `User-Agent`, classified only at aggregation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub short_code: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_hint: Option<String>,
}

impl ClickEvent {
    /// Creates a new click event.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let event = ClickEvent::new("k8mRho4", Utc::now(), Some("Mozilla/5.0"));
    /// ```
    pub fn new(
        short_code: impl Into<String>,
        timestamp: DateTime<Utc>,
        device_hint: Option<&str>,
    ) -> Self {
        Self {
            short_code: short_code.into(),
            timestamp,
            device_hint: device_hint.map(|s| s.to_string()),
        }
    }

    /// Serializes the event into its log payload.
    pub fn to_payload(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| AppError::payload(e.to_string()))
    }

    /// Parses a log payload back into an event.
    pub fn from_payload(payload: &str) -> Result<Self, AppError> {
        serde_json::from_str(payload).map_err(|e| AppError::payload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap()
    }

    #[test]
    fn test_click_event_creation_full() {
        let event = ClickEvent::new("abc1234", t0(), Some("Mozilla/5.0"));

        assert_eq!(event.short_code, "abc1234");
        assert_eq!(event.timestamp, t0());
        assert_eq!(event.device_hint, Some("Mozilla/5.0".to_string()));
    }

    #[test]
    fn test_payload_uses_camel_case_keys() {
        let event = ClickEvent::new("abc1234", t0(), Some("Safari"));
        let payload = event.to_payload().unwrap();

        assert!(payload.contains("\"shortCode\":\"abc1234\""));
        assert!(payload.contains("\"deviceHint\":\"Safari\""));
        assert_eq!(ClickEvent::from_payload(&payload).unwrap(), event);
    }

    #[test]
    fn test_payload_without_device_hint() {
        let payload = r#"{"shortCode":"xyz7890","timestamp":"2024-01-01T10:15:00Z"}"#;
        let event = ClickEvent::from_payload(payload).unwrap();

        assert_eq!(event.short_code, "xyz7890");
        assert_eq!(event.timestamp, t0());
        assert!(event.device_hint.is_none());
    }

    #[test]
    fn test_payload_rejects_malformed_json() {
        assert!(matches!(
            ClickEvent::from_payload("{not json"),
            Err(AppError::Payload { .. })
        ));
        assert!(ClickEvent::from_payload(r#"{"shortCode":"a"}"#).is_err());
    }
}
