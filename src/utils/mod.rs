//! Pure helpers used by the allocator and the workers.
//!
//! - [`id_shuffler`] - Bijective scrambling of sequential ids
//! - [`base62`] - Fixed-width short code rendering
//! - [`deadline`] - Timeout wrapper for store calls

pub mod base62;
pub mod deadline;
pub mod id_shuffler;
