//! Repository trait definitions for the domain layer.
//!
//! These traits are the contracts the allocator and the click pipeline need
//! from their external collaborators. Concrete implementations live in
//! `crate::infrastructure`.
//!
//! # Architecture
//!
//! - Traits define the contract for data operations
//! - Implementations live in `crate::infrastructure::{persistence, stream, memory}`
//! - Mock implementations are auto-generated via `mockall` for testing
//!
//! # Available Repositories
//!
//! - [`SequenceRepository`] - Atomic increment-and-fetch counter
//! - [`ClickLog`] - Durable log with consumer groups
//! - [`RollupRepository`] - Idempotent hourly/daily rollups
//! - [`LinkRepository`] - Link totals, summaries and expiry
//! - [`LockRepository`] - Leased scheduler locks

pub mod click_log;
pub mod link_repository;
pub mod lock_repository;
pub mod rollup_repository;
pub mod sequence_repository;

pub use click_log::ClickLog;
pub use link_repository::LinkRepository;
pub use lock_repository::LockRepository;
pub use rollup_repository::RollupRepository;
pub use sequence_repository::SequenceRepository;

#[cfg(test)]
pub use click_log::MockClickLog;
#[cfg(test)]
pub use link_repository::MockLinkRepository;
#[cfg(test)]
pub use lock_repository::MockLockRepository;
#[cfg(test)]
pub use rollup_repository::MockRollupRepository;
#[cfg(test)]
pub use sequence_repository::MockSequenceRepository;
