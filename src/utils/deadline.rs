//! Timeout wrapper for calls into external stores.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Awaits `fut` for at most `limit`, surfacing expiry as [`AppError::Timeout`].
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation,
            after: limit,
        }),
    }
}
