//! Read models for shortened links.
//!
//! The link row itself belongs to the surrounding service; this crate only
//! reads its summary and maintains its running click total.

use chrono::{DateTime, Utc};

/// A link with its running click total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSummary {
    pub code: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub total_clicks: u64,
}

impl LinkSummary {
    /// Returns true if the link has passed its expiry time at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e < now)
    }
}

/// System-wide counters used by the summary view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemTotals {
    pub total_links: u64,
    pub total_clicks: u64,
}
