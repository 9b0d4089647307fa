//! Collaborator contracts consumed by the chat session.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::{ConversationId, UserId};
use crate::chat::core::message::{MessagePage, NewMessage, Reply};

/// Boxed future type for collaborator operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence collaborator.
pub trait MessageStore: Send + Sync {
    /// Store a message and return its persisted id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn insert_message(
        &self,
        conversation_id: ConversationId,
        message: NewMessage,
    ) -> BackendFuture<'_, ChatResult<String>>;

    /// Load one page of messages, newest first, with the total stored count.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_messages(
        &self,
        conversation_id: ConversationId,
        page: usize,
        page_size: usize,
    ) -> BackendFuture<'_, ChatResult<MessagePage>>;

    /// Overwrite the title of a conversation.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn update_conversation_title(
        &self,
        conversation_id: ConversationId,
        title: String,
    ) -> BackendFuture<'_, ChatResult<()>>;

    /// Read the stored title, `None` while the conversation is untitled.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn conversation_title(
        &self,
        conversation_id: ConversationId,
    ) -> BackendFuture<'_, ChatResult<Option<String>>>;

    /// Create an untitled conversation owned by `user_id`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn create_conversation(&self, user_id: UserId) -> BackendFuture<'_, ChatResult<ConversationId>>;
}

/// Reply-fetch collaborator. Replies are atomic: either a full reply or an error.
pub trait ReplyFetcher: Send + Sync {
    /// Fetch the reply for a user message.
    ///
    /// # Errors
    /// Returns an error on transport failure or an unusable response.
    fn fetch_reply(&self, text: String) -> BackendFuture<'_, ChatResult<Reply>>;
}

/// Severity of a user-visible notice.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Transient warning, e.g. a duplicate message.
    Warning,
    /// Generic error.
    Error,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Notification collaborator for user-visible toasts.
pub trait Notifier: Send + Sync {
    /// Show a notice.
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Navigation collaborator.
pub trait Navigator: Send + Sync {
    /// Send the user to the authentication view.
    fn redirect_to_auth(&self);
}
