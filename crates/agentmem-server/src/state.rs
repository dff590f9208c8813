use agentmem_core::SharedMemory;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub memory: Arc<SharedMemory>,
}

impl AppState {
    pub fn new(memory: Arc<SharedMemory>) -> Self {
        Self { memory }
    }
}
