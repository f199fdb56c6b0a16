//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - PostgreSQL repositories (sequence, rollups, links, locks)
//! - [`stream`] - Redis Streams click log
//! - [`memory`] - In-process implementations of every contract

pub mod memory;
pub mod persistence;
pub mod stream;
