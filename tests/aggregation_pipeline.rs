mod common;

use chrono::{TimeDelta, Utc};
use common::{DESKTOP_UA, FailFirstWrite, PHONE_UA, Pipeline, day, eager_policy, hour, t0};
use std::sync::Arc;
use std::time::Duration;
use tinyurl_core::application::scheduler::TickOutcome;
use tinyurl_core::domain::cleanup_worker::CleanupWorker;
use tinyurl_core::domain::click_worker::PROCESS_CLICKS_LOCK;
use tinyurl_core::domain::device_class::DeviceClass;
use tinyurl_core::domain::entities::{Granularity, LockPolicy};
use tinyurl_core::domain::repositories::{ClickLog, LockRepository};
use tinyurl_core::error::AppError;

#[tokio::test]
async fn test_reference_scenario_end_to_end() {
    let pipeline = Pipeline::new(eager_policy()).await;
    pipeline.add_link("X", None).await;
    pipeline.add_link("Y", None).await;

    pipeline
        .click_all(&[
            ("X", t0(), None),
            ("X", t0() + TimeDelta::seconds(5), None),
            ("Y", t0() + TimeDelta::seconds(3600), None),
        ])
        .await;

    let worker = pipeline.worker(false);
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Completed));

    let links = &pipeline.links;
    assert_eq!(links.rollup_count("X", &hour(t0())).await, Some(2));
    assert_eq!(
        links.rollup_count("Y", &hour(t0() + TimeDelta::hours(1))).await,
        Some(1)
    );
    assert_eq!(links.rollup_count("X", &day(t0())).await, Some(2));
    assert_eq!(links.total_clicks("X").await, Some(2));
    assert_eq!(links.total_clicks("Y").await, Some(1));
    assert_eq!(pipeline.log.pending_count(common::GROUP).await.unwrap(), 0);

    let stats = pipeline
        .stats
        .url_stats(
            "X",
            Granularity::Hour,
            t0() - TimeDelta::hours(1),
            t0() + TimeDelta::hours(2),
        )
        .await
        .unwrap();
    assert_eq!(stats.link.total_clicks, 2);
    assert_eq!(stats.points.len(), 1);
    assert_eq!(stats.points[0].bucket_start, hour(t0()).start);
    assert_eq!(stats.clicks_in_range(), 2);

    let summary = pipeline.stats.system_summary(10).await.unwrap();
    assert_eq!(summary.totals.total_links, 2);
    assert_eq!(summary.totals.total_clicks, 3);
    assert_eq!(summary.top_links[0].code, "X");
}

#[tokio::test]
async fn test_failed_cycle_is_redelivered_and_converges() {
    let pipeline = Pipeline::new(eager_policy()).await;
    pipeline.add_link("X", None).await;
    pipeline.add_link("Y", None).await;

    pipeline
        .click_all(&[
            ("X", t0(), None),
            ("X", t0() + TimeDelta::seconds(5), None),
            ("Y", t0() + TimeDelta::seconds(3600), None),
        ])
        .await;

    // X is written, then the first write for Y fails.
    let rollups = Arc::new(FailFirstWrite::new(pipeline.links.clone(), &["Y"]));
    let worker = pipeline.worker_over(rollups, false);

    let outcome = pipeline.scheduler.tick(&worker).await;
    assert!(matches!(outcome, TickOutcome::Failed(AppError::Persist { .. })));
    assert_eq!(pipeline.log.pending_count(common::GROUP).await.unwrap(), 3);
    assert_eq!(pipeline.links.rollup_count("X", &hour(t0())).await, Some(2));

    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Completed));

    let links = &pipeline.links;
    assert_eq!(links.rollup_count("X", &hour(t0())).await, Some(2));
    assert_eq!(links.rollup_count("X", &day(t0())).await, Some(2));
    assert_eq!(links.total_clicks("X").await, Some(2));
    assert_eq!(
        links.rollup_count("Y", &hour(t0() + TimeDelta::hours(1))).await,
        Some(1)
    );
    assert_eq!(links.total_clicks("Y").await, Some(1));
    assert_eq!(pipeline.log.pending_count(common::GROUP).await.unwrap(), 0);
}

#[tokio::test]
async fn test_batch_left_by_another_instance_is_counted_before_newer_clicks() {
    let pipeline = Pipeline::new(eager_policy()).await;
    pipeline.add_link("X", None).await;
    pipeline.add_link("Y", None).await;

    pipeline
        .click_all(&[
            ("X", t0(), None),
            ("X", t0() + TimeDelta::seconds(1), None),
            ("X", t0() + TimeDelta::seconds(2), None),
            ("Y", t0(), None),
        ])
        .await;

    // Instance A writes X, then fails on Y and leaves the batch pending.
    let flaky = Arc::new(FailFirstWrite::new(pipeline.links.clone(), &["Y"]));
    let instance_a = pipeline.worker_as("instance-a", flaky);
    let outcome = pipeline.scheduler.tick(&instance_a).await;
    assert!(matches!(outcome, TickOutcome::Failed(AppError::Persist { .. })));
    assert_eq!(pipeline.log.pending_count(common::GROUP).await.unwrap(), 4);

    pipeline
        .click_all(&[
            ("X", t0() + TimeDelta::seconds(3), None),
            ("Y", t0() + TimeDelta::seconds(3), None),
        ])
        .await;

    // Instance B takes over A's batch first, then reads the newer clicks.
    let instance_b = pipeline.worker_as("instance-b", pipeline.links.clone());
    assert!(matches!(pipeline.scheduler.tick(&instance_b).await, TickOutcome::Completed));
    assert_eq!(pipeline.log.pending_count(common::GROUP).await.unwrap(), 0);
    assert_eq!(pipeline.links.total_clicks("Y").await, Some(1));

    assert!(matches!(pipeline.scheduler.tick(&instance_b).await, TickOutcome::Completed));
    assert!(matches!(pipeline.scheduler.tick(&instance_a).await, TickOutcome::Completed));

    let links = &pipeline.links;
    for (code, clicks) in [("X", 4), ("Y", 2)] {
        assert_eq!(links.rollup_count(code, &hour(t0())).await, Some(clicks));
        assert_eq!(links.rollup_count(code, &day(t0())).await, Some(clicks));
        assert_eq!(links.total_clicks(code).await, Some(clicks));
    }
    assert_eq!(pipeline.log.pending_count(common::GROUP).await.unwrap(), 0);
}

#[tokio::test]
async fn test_later_batches_add_to_existing_rows() {
    let pipeline = Pipeline::new(eager_policy()).await;
    pipeline.add_link("X", None).await;
    let worker = pipeline.worker(false);

    pipeline
        .click_all(&[("X", t0(), None), ("X", t0(), None)])
        .await;
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Completed));

    pipeline
        .click_all(&[("X", t0() + TimeDelta::minutes(10), None), ("X", t0(), None)])
        .await;
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Completed));

    assert_eq!(pipeline.links.rollup_count("X", &hour(t0())).await, Some(4));
    assert_eq!(pipeline.links.total_clicks("X").await, Some(4));
}

#[tokio::test(start_paused = true)]
async fn test_lock_held_elsewhere_skips_the_tick() {
    let policy = LockPolicy::default();
    let pipeline = Pipeline::new(policy).await;
    pipeline.add_link("X", None).await;
    pipeline.click_all(&[("X", t0(), None)]).await;

    // Another instance is mid-cycle.
    let other = pipeline
        .locks
        .try_acquire(PROCESS_CLICKS_LOCK, &policy)
        .await
        .unwrap()
        .unwrap();

    let worker = pipeline.worker(false);
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Skipped));
    assert_eq!(pipeline.links.total_clicks("X").await, Some(0));
    assert_eq!(pipeline.log.len().await, 1);

    // Released early, still held for the min hold.
    pipeline.locks.release(&other).await.unwrap();
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Skipped));

    tokio::time::advance(policy.min_hold).await;
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Completed));
    assert_eq!(pipeline.links.total_clicks("X").await, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_lock_is_taken_over_after_max_hold() {
    let policy = LockPolicy {
        max_hold: Duration::from_secs(60),
        min_hold: Duration::ZERO,
    };
    let pipeline = Pipeline::new(policy).await;
    pipeline.add_link("X", None).await;
    pipeline.click_all(&[("X", t0(), None)]).await;

    // Holder crashed without releasing.
    let _crashed = pipeline
        .locks
        .try_acquire(PROCESS_CLICKS_LOCK, &policy)
        .await
        .unwrap()
        .unwrap();

    let worker = pipeline.worker(false);
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Skipped));

    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Completed));
    assert_eq!(pipeline.links.total_clicks("X").await, Some(1));
}

#[tokio::test]
async fn test_device_breakdown_layers_on_base_rollups() {
    let pipeline = Pipeline::new(eager_policy()).await;
    pipeline.add_link("X", None).await;

    pipeline
        .click_all(&[
            ("X", t0(), Some(DESKTOP_UA)),
            ("X", t0(), Some(PHONE_UA)),
            ("X", t0() + TimeDelta::minutes(1), Some(PHONE_UA)),
            ("X", t0() + TimeDelta::minutes(2), None),
        ])
        .await;

    let worker = pipeline.worker(true);
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Completed));

    assert_eq!(pipeline.links.rollup_count("X", &hour(t0())).await, Some(4));
    assert_eq!(pipeline.links.total_clicks("X").await, Some(4));

    let breakdown = pipeline
        .stats
        .device_breakdown("X", Granularity::Day, day(t0()).start, t0())
        .await
        .unwrap();
    assert_eq!(
        breakdown,
        vec![
            (DeviceClass::Desktop, 1),
            (DeviceClass::Mobile, 2),
            (DeviceClass::Tablet, 0),
            (DeviceClass::Other, 1),
        ]
    );
}

#[tokio::test]
async fn test_clicks_for_missing_links_are_dropped() {
    let pipeline = Pipeline::new(eager_policy()).await;
    pipeline.add_link("X", None).await;

    pipeline
        .click_all(&[("gone", t0(), None), ("X", t0(), None)])
        .await;

    let worker = pipeline.worker(false);
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Completed));

    assert!(!pipeline.links.contains("gone").await);
    assert_eq!(pipeline.links.total_clicks("X").await, Some(1));
    assert_eq!(pipeline.log.pending_count(common::GROUP).await.unwrap(), 0);

    let summary = pipeline.stats.system_summary(10).await.unwrap();
    assert_eq!(summary.totals.total_clicks, 1);
}

#[tokio::test]
async fn test_cleanup_removes_expired_links_with_their_rollups() {
    let pipeline = Pipeline::new(eager_policy()).await;
    let now = Utc::now();
    pipeline.add_link("old", Some(now - TimeDelta::hours(1))).await;
    pipeline.add_link("fresh", Some(now + TimeDelta::days(1))).await;
    pipeline.add_link("forever", None).await;

    pipeline.click_all(&[("old", t0(), None)]).await;
    let worker = pipeline.worker(false);
    assert!(matches!(pipeline.scheduler.tick(&worker).await, TickOutcome::Completed));
    assert_eq!(pipeline.links.rollup_count("old", &hour(t0())).await, Some(1));

    let cleanup = CleanupWorker::new(pipeline.links.clone(), Duration::from_secs(5));
    assert!(matches!(pipeline.scheduler.tick(&cleanup).await, TickOutcome::Completed));

    assert!(!pipeline.links.contains("old").await);
    assert!(pipeline.links.contains("fresh").await);
    assert!(pipeline.links.contains("forever").await);
    assert_eq!(pipeline.links.rollup_count("old", &hour(t0())).await, None);

    let result = pipeline
        .stats
        .url_stats("old", Granularity::Hour, t0(), t0())
        .await;
    assert!(matches!(result, Err(AppError::NotFound { .. })));
}
