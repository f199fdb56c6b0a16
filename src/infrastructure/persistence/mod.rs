//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx runtime
//! queries against the schema in `migrations/`.
//!
//! # Repositories
//!
//! - [`PgSequenceRepository`] - The global id counter
//! - [`PgRollupRepository`] - Idempotent hourly and daily rollups
//! - [`PgLinkRepository`] - Link totals, summaries and expiry
//! - [`PgLockRepository`] - Scheduler locks

pub mod pg_link_repository;
pub mod pg_lock_repository;
pub mod pg_rollup_repository;
pub mod pg_sequence_repository;

pub use pg_link_repository::PgLinkRepository;
pub use pg_lock_repository::PgLockRepository;
pub use pg_rollup_repository::PgRollupRepository;
pub use pg_sequence_repository::PgSequenceRepository;
