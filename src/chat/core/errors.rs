//! Error types for the chat core.

use thiserror::Error;

/// Chat core error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Same text was sent again inside the duplicate window.
    #[error("duplicate message, wait before sending it again")]
    DuplicateSubmission,
    /// Storage rejected a write or read.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
    /// The reply service failed or returned an unusable response.
    #[error("reply fetch failure: {0}")]
    ReplyFetchFailure(String),
    /// No authenticated user is available.
    #[error("no authenticated user")]
    NotAuthenticated,
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Regex error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
