//! Business logic services for the application layer.

pub mod block_allocator;
pub mod click_emitter;
pub mod code_generator;
pub mod stats_service;

pub use block_allocator::{BlockAllocator, SequenceBlockAllocator};
pub use click_emitter::ClickEmitter;
pub use code_generator::ShortCodeGenerator;
pub use stats_service::{StatsService, SystemSummary, UrlStats};
