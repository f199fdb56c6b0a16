//! Handles given to the surrounding service.

use std::sync::Arc;

use crate::application::services::{ClickEmitter, SequenceBlockAllocator, ShortCodeGenerator};
use crate::infrastructure::persistence::PgSequenceRepository;
use crate::infrastructure::stream::RedisClickLog;

pub type CodeGenerator = ShortCodeGenerator<SequenceBlockAllocator<PgSequenceRepository>>;
pub type Emitter = ClickEmitter<RedisClickLog>;

/// What the redirect and shorten paths need: codes for new links and a way
/// to record clicks.
#[derive(Clone)]
pub struct AppState {
    pub code_generator: Arc<CodeGenerator>,
    pub click_emitter: Emitter,
}

impl AppState {
    pub fn new(code_generator: Arc<CodeGenerator>, click_emitter: Emitter) -> Self {
        Self {
            code_generator,
            click_emitter,
        }
    }
}
