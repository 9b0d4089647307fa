//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::adapters::default_backends;
use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::ChatResult;
use crate::chat::session::coordinator::{ChatBackends, ChatSession};

/// Shared application state.
pub struct AppState {
    /// Session driving the open conversation.
    pub session: ChatSession,
}

impl AppState {
    /// Create a new application state with the default backends.
    ///
    /// # Errors
    /// Returns an error if the backends or the session cannot be created.
    pub async fn new(config: ChatConfig) -> ChatResult<Arc<Self>> {
        let backends = default_backends(&config).await?;
        Self::with_backends(config, backends)
    }

    /// Create a new application state over explicit collaborators.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_backends(config: ChatConfig, backends: ChatBackends) -> ChatResult<Arc<Self>> {
        let session = ChatSession::new(config, backends)?;
        Ok(Arc::new(Self { session }))
    }
}
