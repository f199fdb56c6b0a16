//! Leases on cluster-wide scheduler locks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Hold limits applied to a scheduler lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// After this the lock is considered abandoned and may be taken over.
    pub max_hold: Duration,
    /// The lock is kept at least this long, even if released earlier.
    pub min_hold: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_hold: Duration::from_secs(300),
            min_hold: Duration::from_secs(30),
        }
    }
}

/// Proof that the holder owns a named lock until `deadline`.
///
/// The deadline is taken from the local monotonic clock *before* the acquire
/// round-trip started, so it never outlives the store-side expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub name: String,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub policy: LockPolicy,
    pub deadline: Instant,
}

impl Lease {
    pub fn new(
        name: impl Into<String>,
        holder: impl Into<String>,
        acquired_at: DateTime<Utc>,
        policy: LockPolicy,
        requested_at: Instant,
    ) -> Self {
        Self {
            name: name.into(),
            holder: holder.into(),
            acquired_at,
            policy,
            deadline: requested_at + policy.max_hold,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_lease_expires_after_max_hold() {
        let policy = LockPolicy {
            max_hold: Duration::from_secs(10),
            min_hold: Duration::from_secs(1),
        };
        let lease = Lease::new("job", "holder-1", Utc::now(), policy, Instant::now());

        assert!(!lease.is_expired());
        assert_eq!(lease.remaining(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(lease.is_expired());
        assert_eq!(lease.remaining(), Duration::ZERO);
    }
}
