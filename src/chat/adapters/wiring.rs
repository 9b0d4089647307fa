//! Default wiring: `SQLite` persistence, HTTP replies, log-only notices.

use std::sync::Arc;

use crate::chat::backends::http::HttpReplyFetcher;
use crate::chat::backends::notify::{TracingNavigator, TracingNotifier};
use crate::chat::backends::sqlite::SqliteMessageStore;
use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::ChatResult;
use crate::chat::session::coordinator::ChatBackends;

/// Initialize tracing, `RUST_LOG` first, `info` otherwise.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Build the default collaborators from config.
///
/// # Errors
/// Returns an error if the database cannot be opened or the reply endpoint is invalid.
pub async fn default_backends(config: &ChatConfig) -> ChatResult<ChatBackends> {
    let messages = Arc::new(SqliteMessageStore::new(&config.storage).await?);
    let replies = Arc::new(HttpReplyFetcher::new(&config.reply)?);

    Ok(ChatBackends {
        messages,
        replies,
        notifier: Arc::new(TracingNotifier),
        navigator: Arc::new(TracingNavigator),
    })
}
