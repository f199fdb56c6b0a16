//! Application layer: the services collaborators call and the scheduler that
//! drives the background workers.
//!
//! # Available Services
//!
//! - [`services::code_generator::ShortCodeGenerator`] - Short code generation from id blocks
//! - [`services::block_allocator::SequenceBlockAllocator`] - Block reservation from the shared counter
//! - [`services::click_emitter::ClickEmitter`] - Fire-and-forget click emission
//! - [`services::stats_service::StatsService`] - Rollup-backed statistics
//! - [`scheduler::JobScheduler`] - Lock-guarded periodic jobs

pub mod scheduler;
pub mod services;
