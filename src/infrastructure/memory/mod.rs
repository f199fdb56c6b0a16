//! In-process backends with the same contracts as the Postgres and Redis
//! adapters. Used by tests and for running the pipeline without a backend.

pub mod click_log;
pub mod links;
pub mod locks;
pub mod sequence;

pub use click_log::MemoryClickLog;
pub use links::MemoryLinkStore;
pub use locks::MemoryLockRepository;
pub use sequence::MemorySequenceRepository;
