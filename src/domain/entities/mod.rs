//! Core data structures of the allocator and the click pipeline.
//!
//! # Entity Types
//!
//! - [`BlockRange`], [`AllocatedBlock`] - Reserved id ranges and the cursor over them
//! - [`RollupBucket`], [`RollupDelta`], [`AppliedCount`] - Rollup keys and idempotent counting
//! - [`LinkSummary`], [`SystemTotals`] - Read models over links
//! - [`Lease`], [`LockPolicy`] - Scheduler lock ownership

pub mod block;
pub mod lease;
pub mod link;
pub mod rollup;

pub use block::{AllocatedBlock, BlockRange};
pub use lease::{Lease, LockPolicy};
pub use link::{LinkSummary, SystemTotals};
pub use rollup::{AppliedCount, Granularity, RollupBucket, RollupDelta, RollupPoint};
