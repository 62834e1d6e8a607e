//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use persona_chat_core::{CompletionProvider, MessageStore, PersistenceQueue, RateLimiter};

use crate::config::Config;

/// State shared across all HTTP handlers.
///
/// Every collaborator is constructed by the bootstrap in `main` and injected
/// here, so tests (or a multi-instance deployment) can substitute any of them.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Per-client request limiter consulted before any other work.
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Hosted LLM used for replies.
    pub provider: Arc<dyn CompletionProvider>,
    /// Conversation history, read by the history endpoint.
    pub store: Arc<dyn MessageStore>,
    /// Background writer for completed turns.
    pub persistence: PersistenceQueue,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}
