//! Lock-guarded periodic execution of [`ScheduledJob`]s.
//!
//! Every tick tries to take the job's named lock. A busy lock means another
//! instance is on it and the tick is skipped. Otherwise the job runs with the
//! lease's remaining budget as its timeout; when that elapses the job future
//! is dropped, which stops it mid-write.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::domain::entities::LockPolicy;
use crate::domain::repositories::LockRepository;
use crate::error::AppError;
use crate::utils::deadline::bounded;

pub use crate::domain::scheduled_job::ScheduledJob;

#[derive(Debug)]
pub enum TickOutcome {
    /// Another holder has the lock.
    Skipped,
    Completed,
    Failed(AppError),
    /// The job outlived its lease and was cancelled.
    Abandoned,
}

pub struct JobScheduler<K: LockRepository> {
    locks: Arc<K>,
    policy: LockPolicy,
    op_timeout: Duration,
}

impl<K: LockRepository> JobScheduler<K> {
    pub fn new(locks: Arc<K>, policy: LockPolicy, op_timeout: Duration) -> Self {
        Self {
            locks,
            policy,
            op_timeout,
        }
    }

    /// Runs `job` once if its lock can be taken.
    pub async fn tick<J: ScheduledJob + ?Sized>(&self, job: &J) -> TickOutcome {
        let name = job.lock_name();

        let acquired = bounded(
            "lock acquire",
            self.op_timeout,
            self.locks.try_acquire(name, &self.policy),
        )
        .await;

        let lease = match acquired {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                tracing::debug!(lock = name, "Lock busy, skipping tick");
                metrics::counter!("scheduler_ticks_skipped_total", "lock" => name).increment(1);
                return TickOutcome::Skipped;
            }
            Err(e) => {
                tracing::warn!(lock = name, error = %e, "Failed to acquire lock");
                return TickOutcome::Failed(e);
            }
        };

        let outcome = match tokio::time::timeout(lease.remaining(), job.run(&lease)).await {
            Ok(Ok(())) => TickOutcome::Completed,
            Ok(Err(e)) => {
                tracing::error!(lock = name, error = %e, "Scheduled job failed");
                TickOutcome::Failed(e)
            }
            Err(_) => {
                tracing::error!(
                    lock = name,
                    max_hold = ?self.policy.max_hold,
                    "Scheduled job exceeded its lease and was abandoned"
                );
                TickOutcome::Abandoned
            }
        };

        if let Err(e) = bounded("lock release", self.op_timeout, self.locks.release(&lease)).await {
            // The lock still expires on its own after max_hold.
            tracing::warn!(lock = name, error = %e, "Failed to release lock");
        }

        outcome
    }

    /// Ticks `job` every `interval` until `shutdown` flips to `true`.
    ///
    /// The first tick fires immediately. Ticks missed while a job was running
    /// are skipped rather than fired back to back.
    pub async fn run_every<J: ScheduledJob + ?Sized>(
        &self,
        job: Arc<J>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(lock = job.lock_name(), ?interval, "Scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(job.as_ref()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(lock = job.lock_name(), "Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Lease;
    use crate::domain::repositories::MockLockRepository;
    use crate::infrastructure::memory::MemoryLockRepository;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    struct CountingJob {
        runs: AtomicUsize,
        work: Duration,
    }

    impl CountingJob {
        fn new(work: Duration) -> Self {
            Self {
                runs: AtomicUsize::new(0),
                work,
            }
        }
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        fn lock_name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, _lease: &Lease) -> Result<(), AppError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            Ok(())
        }
    }

    fn policy() -> LockPolicy {
        LockPolicy {
            max_hold: Duration::from_secs(300),
            min_hold: Duration::from_secs(30),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_runs_job_and_releases() {
        let locks = Arc::new(MemoryLockRepository::new());
        let scheduler = JobScheduler::new(locks.clone(), policy(), Duration::from_secs(5));
        let job = CountingJob::new(Duration::from_secs(1));

        assert!(matches!(scheduler.tick(&job).await, TickOutcome::Completed));
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        // Held until acquired_at + min_hold.
        assert!(matches!(scheduler.tick(&job).await, TickOutcome::Skipped));
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(matches!(scheduler.tick(&job).await, TickOutcome::Completed));
    }

    #[tokio::test]
    async fn test_busy_lock_skips_without_running() {
        let mut locks = MockLockRepository::new();
        locks.expect_try_acquire().returning(|_, _| Ok(None));
        locks.expect_release().never();

        let scheduler = JobScheduler::new(Arc::new(locks), policy(), Duration::from_secs(5));
        let job = CountingJob::new(Duration::ZERO);

        assert!(matches!(scheduler.tick(&job).await, TickOutcome::Skipped));
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_exceeding_lease_is_abandoned() {
        let mut locks = MockLockRepository::new();
        locks.expect_try_acquire().returning(|name, policy| {
            Ok(Some(Lease::new(name, "h", Utc::now(), *policy, Instant::now())))
        });
        locks.expect_release().times(1).returning(|_| Ok(()));

        let short = LockPolicy {
            max_hold: Duration::from_secs(10),
            min_hold: Duration::from_secs(1),
        };
        let scheduler = JobScheduler::new(Arc::new(locks), short, Duration::from_secs(5));
        let job = CountingJob::new(Duration::from_secs(60));

        assert!(matches!(scheduler.tick(&job).await, TickOutcome::Abandoned));
    }

    #[tokio::test]
    async fn test_acquire_error_fails_tick() {
        let mut locks = MockLockRepository::new();
        locks
            .expect_try_acquire()
            .returning(|_, _| Err(AppError::storage("connection refused")));

        let scheduler = JobScheduler::new(Arc::new(locks), policy(), Duration::from_secs(5));
        let job = CountingJob::new(Duration::ZERO);

        assert!(matches!(
            scheduler.tick(&job).await,
            TickOutcome::Failed(AppError::Storage { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_every_stops_on_shutdown() {
        let locks = Arc::new(MemoryLockRepository::new());
        let no_hold = LockPolicy {
            max_hold: Duration::from_secs(300),
            min_hold: Duration::ZERO,
        };
        let scheduler = Arc::new(JobScheduler::new(locks, no_hold, Duration::from_secs(5)));
        let job = Arc::new(CountingJob::new(Duration::ZERO));
        let (tx, rx) = watch::channel(false);

        let handle = {
            let scheduler = scheduler.clone();
            let job = job.clone();
            tokio::spawn(async move {
                scheduler.run_every(job, Duration::from_secs(60), rx).await;
            })
        };

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(job.runs.load(Ordering::SeqCst), 3);
    }
}
