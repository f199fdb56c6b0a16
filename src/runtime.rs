//! Process wiring: connections, migrations and the background schedulers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::application::scheduler::JobScheduler;
use crate::application::services::{ClickEmitter, SequenceBlockAllocator, ShortCodeGenerator};
use crate::config::Config;
use crate::domain::cleanup_worker::CleanupWorker;
use crate::domain::click_worker::AggregationWorker;
use crate::domain::repositories::ClickLog;
use crate::infrastructure::persistence::{
    PgLinkRepository, PgLockRepository, PgRollupRepository, PgSequenceRepository,
};
use crate::infrastructure::stream::RedisClickLog;
use crate::state::AppState;

fn backoff() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(100)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(6)
}

/// Connects to Postgres with retries and applies pending migrations.
///
/// # Errors
///
/// Returns an error if the database stays unreachable or a migration fails.
pub async fn connect_database(config: &Config) -> Result<PgPool> {
    let options = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime));

    let pool = Retry::start(backoff(), || {
        let options = options.clone();
        async move {
            options.connect(&config.database_url).await.inspect_err(|e| {
                tracing::warn!(error = %e, "Database not reachable yet, retrying");
            })
        }
    })
    .await
    .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    Ok(pool)
}

/// Connects to the Redis click log and makes sure the consumer group exists.
///
/// # Errors
///
/// Returns an error if Redis stays unreachable.
pub async fn connect_click_log(config: &Config) -> Result<RedisClickLog> {
    let log = Retry::start(backoff(), || async {
        RedisClickLog::connect(&config.redis_url, config.click_stream_key.as_str())
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Redis not reachable yet, retrying"))
    })
    .await
    .context("Failed to connect to Redis")?;

    Retry::start(backoff(), || log.ensure_group(&config.click_consumer_group))
        .await
        .context("Failed to create click consumer group")?;

    Ok(log)
}

/// Builds the generator and emitter on top of live backends for a service
/// that mints codes. [`run`] does not call it, so the worker process never
/// reserves an id block.
///
/// # Errors
///
/// Returns an error if the first id block cannot be reserved.
pub async fn build_state(config: &Config, pool: Arc<PgPool>, log: Arc<RedisClickLog>) -> Result<AppState> {
    let sequence = Arc::new(PgSequenceRepository::new(pool));
    let allocator = Arc::new(SequenceBlockAllocator::new(sequence, config.operation_timeout));
    let generator = Arc::new(ShortCodeGenerator::new(allocator, config.block_size));

    generator
        .warm_up()
        .await
        .context("Failed to reserve the first id block")?;

    let emitter = ClickEmitter::new(log, config.emit_timeout);

    Ok(AppState::new(generator, emitter))
}

/// Runs the aggregation and cleanup schedulers until Ctrl+C.
///
/// # Errors
///
/// Returns an error if startup fails. Failures inside a cycle are logged and
/// retried on the next tick.
pub async fn run(config: Config) -> Result<()> {
    let pool = Arc::new(connect_database(&config).await?);
    let log = Arc::new(connect_click_log(&config).await?);

    let links = Arc::new(PgLinkRepository::new(pool.clone()));
    let rollups = Arc::new(PgRollupRepository::new(pool.clone()));
    let locks = Arc::new(PgLockRepository::new(pool.clone()));

    let scheduler = Arc::new(JobScheduler::new(
        locks,
        config.lock_policy(),
        config.operation_timeout,
    ));

    let aggregation = Arc::new(AggregationWorker::new(
        log,
        rollups,
        links.clone(),
        config.worker_config(),
    ));
    let cleanup = Arc::new(CleanupWorker::new(links, config.operation_timeout));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let aggregation_task = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown_rx.clone();
        let interval = config.aggregation_interval;
        tokio::spawn(async move { scheduler.run_every(aggregation, interval, shutdown).await })
    };
    let cleanup_task = {
        let scheduler = scheduler.clone();
        let interval = config.cleanup_interval;
        tokio::spawn(async move { scheduler.run_every(cleanup, interval, shutdown_rx).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    // Receivers may already be gone if a scheduler task panicked.
    let _ = shutdown_tx.send(true);
    let (aggregation_result, cleanup_result) = tokio::join!(aggregation_task, cleanup_task);
    aggregation_result.context("Aggregation scheduler panicked")?;
    cleanup_result.context("Cleanup scheduler panicked")?;

    pool.close().await;
    tracing::info!("Stopped");

    Ok(())
}
