//! Error taxonomy shared by the allocator and the click pipeline.
//!
//! Store adapters return [`AppError::Storage`] (via the `From` impls below) and
//! callers re-map it to the failure that matters at their level: allocation,
//! emission or persistence. Timeouts stay distinct everywhere.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The counter store could not confirm a block reservation.
    #[error("block allocation failed: {message}")]
    Allocation { message: String },

    /// A click event could not be appended to the log.
    #[error("click emission failed: {message}")]
    Emit { message: String },

    /// A rollup or total write failed during an aggregation cycle.
    #[error("aggregation persist failed: {message}")]
    Persist { message: String },

    /// The cycle outlived its lease; no further writes are allowed.
    #[error("lease on lock '{name}' expired")]
    LockExpired { name: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("invalid click payload: {message}")]
    Payload { message: String },

    #[error("{message}")]
    NotFound { message: String },
}

impl AppError {
    pub fn allocation(message: impl Into<String>) -> Self {
        Self::Allocation {
            message: message.into(),
        }
    }

    pub fn emit(message: impl Into<String>) -> Self {
        Self::Emit {
            message: message.into(),
        }
    }

    pub fn persist(message: impl Into<String>) -> Self {
        Self::Persist {
            message: message.into(),
        }
    }

    pub fn lock_expired(name: impl Into<String>) -> Self {
        Self::LockExpired { name: name.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Re-labels a raw store failure, leaving every other variant untouched.
    pub fn map_storage(self, relabel: impl FnOnce(String) -> AppError) -> AppError {
        match self {
            Self::Storage { message } => relabel(message),
            other => other,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::storage(format!("database: {e}"))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::storage(format!("redis: {e}"))
    }
}

/// Converts an unsigned counter value into the signed column type Postgres uses.
pub fn to_db_int(value: u64) -> Result<i64, AppError> {
    i64::try_from(value).map_err(|_| AppError::storage(format!("value {value} exceeds BIGINT")))
}

/// Converts a signed column value back into an unsigned counter.
pub fn from_db_int(value: i64) -> Result<u64, AppError> {
    u64::try_from(value).map_err(|_| AppError::storage(format!("negative counter value {value}")))
}
