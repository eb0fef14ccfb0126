use std::sync::Arc;

use crate::session::DictationSessionManager;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single dictation session manager for this process
    pub manager: Arc<DictationSessionManager>,
}

impl AppState {
    pub fn new(manager: Arc<DictationSessionManager>) -> Self {
        Self { manager }
    }
}
