//! Domain layer: entities, store contracts and the click pipeline.
//!
//! Nothing here depends on a concrete backend. Repository traits are
//! implemented in [`crate::infrastructure`], and the scheduler in
//! [`crate::application::scheduler`] drives the workers.
//!
//! # Architecture
//!
//! - [`entities`] - Blocks, rollup keys, leases and link read models
//! - [`repositories`] - Store contracts
//! - [`click_event`], [`event_id`] - What travels through the click log
//! - [`device_class`] - Optional device dimension for rollups
//! - [`click_aggregator`] - Pure folding of a batch into deltas
//! - [`click_worker`] - The lease-guarded aggregation cycle
//! - [`cleanup_worker`] - Expired link removal
//!
//! # Click Processing Flow
//!
//! 1. A redirect emits a [`click_event::ClickEvent`] to the log without waiting
//! 2. The scheduler takes the `process_clicks` lock on its interval
//! 3. [`click_worker::AggregationWorker`] claims a batch and folds it
//! 4. Rollups and totals are upserted idempotently, then the batch is acknowledged

pub mod cleanup_worker;
pub mod click_aggregator;
pub mod click_event;
pub mod click_worker;
pub mod device_class;
pub mod entities;
pub mod event_id;
pub mod repositories;
pub mod scheduled_job;
