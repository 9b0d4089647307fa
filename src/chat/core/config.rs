//! Configuration for the chat core.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};

/// Environment variable overriding the `SQLite` path.
const DB_ENV: &str = "CHATLINE_DB";
/// Environment variable overriding the reply endpoint.
const REPLY_URL_ENV: &str = "CHATLINE_REPLY_URL";
/// Environment variable overriding the server port.
const PORT_ENV: &str = "CHATLINE_PORT";

/// Top-level configuration for a chat session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Send/reply exchange settings.
    pub exchange: ExchangeConfig,
    /// Older-page loading settings.
    pub pagination: PaginationConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Reply service settings.
    pub reply: ReplyConfig,
    /// HTTP surface settings.
    pub server: ServerConfig,
}

impl ChatConfig {
    /// Defaults with `CHATLINE_*` environment overrides applied.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_env() -> ChatResult<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(DB_ENV) {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Ok(endpoint) = std::env::var(REPLY_URL_ENV) {
            config.reply.endpoint = endpoint;
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            config.server.port = port
                .parse()
                .map_err(|_| ChatError::InvalidConfig(format!("{PORT_ENV} is not a port: {port}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if self.exchange.duplicate_window_ms == 0 {
            return Err(ChatError::InvalidConfig(
                "exchange.duplicate_window_ms must be > 0".to_string(),
            ));
        }

        if self.exchange.recent_send_ttl_ms < self.exchange.duplicate_window_ms {
            return Err(ChatError::InvalidConfig(
                "exchange.recent_send_ttl_ms must be >= exchange.duplicate_window_ms".to_string(),
            ));
        }

        if self.exchange.title_max_chars == 0 {
            return Err(ChatError::InvalidConfig(
                "exchange.title_max_chars must be > 0".to_string(),
            ));
        }

        if self.exchange.fallback_message.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "exchange.fallback_message must not be empty".to_string(),
            ));
        }

        if self.pagination.page_size == 0 {
            return Err(ChatError::InvalidConfig(
                "pagination.page_size must be > 0".to_string(),
            ));
        }

        if self.reply.timeout_seconds == 0 {
            return Err(ChatError::InvalidConfig(
                "reply.timeout_seconds must be > 0".to_string(),
            ));
        }

        Url::parse(&self.reply.endpoint)?;

        Ok(())
    }
}

/// Send/reply exchange settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Identical text is rejected when resent inside this window.
    pub duplicate_window_ms: u64,
    /// Recent-send entries older than this are evicted.
    pub recent_send_ttl_ms: u64,
    /// Assistant text shown when the reply fetch fails.
    pub fallback_message: String,
    /// Placeholder title of a fresh conversation.
    pub default_title: String,
    /// Characters kept from the first message when deriving a title.
    pub title_max_chars: usize,
}

impl ExchangeConfig {
    /// Duplicate window as a `Duration`.
    #[must_use]
    pub const fn duplicate_window(&self) -> Duration {
        Duration::from_millis(self.duplicate_window_ms)
    }

    /// Recent-send TTL as a `Duration`.
    #[must_use]
    pub const fn recent_send_ttl(&self) -> Duration {
        Duration::from_millis(self.recent_send_ttl_ms)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            duplicate_window_ms: 5_000,
            recent_send_ttl_ms: 60_000,
            fallback_message:
                "I'm sorry, I encountered an error processing your request. Please try again."
                    .to_string(),
            default_title: "New Chat".to_string(),
            title_max_chars: 30,
        }
    }
}

/// Older-page loading settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Messages per page.
    pub page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Conversation table name.
    pub conversations_table: String,
    /// Message table name.
    pub messages_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chatline.sqlite"),
            conversations_table: "conversations".to_string(),
            messages_table: "messages".to_string(),
        }
    }
}

/// Reply service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// Endpoint receiving `POST {"message": ...}`.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl ReplyConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/chat".to_string(),
            timeout_seconds: 120,
        }
    }
}

/// HTTP surface settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}
