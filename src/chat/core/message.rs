//! Message model shared by the store, the coordinator and the backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chat::core::ids::MessageId;

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// Typed by the user.
    User,
    /// Produced by the reply service.
    Assistant,
}

impl Sender {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Whether the message was typed by the user.
    #[must_use]
    pub const fn is_user(self) -> bool {
        matches!(self, Self::User)
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload kind of a message.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text.
    #[default]
    Text,
    /// PDF document, content is base64.
    Pdf,
    /// HTML document.
    Html,
}

impl MessageKind {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            "html" => Ok(Self::Html),
            _ => Err(value.to_string()),
        }
    }
}

/// A message in the visible conversation list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Temporary or persisted identifier.
    pub id: MessageId,
    /// Text payload (base64 for PDFs).
    pub content: String,
    /// Author.
    pub sender: Sender,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Payload kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Attachment filename, only for non-text kinds.
    pub filename: Option<String>,
}

impl Message {
    /// Build an optimistic user message with a temporary id.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::temporary(),
            content: content.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
            kind: MessageKind::Text,
            filename: None,
        }
    }

    /// Build an assistant message from a fetched reply.
    #[must_use]
    pub fn assistant(reply: Reply) -> Self {
        Self {
            id: MessageId::temporary(),
            content: reply.content,
            sender: Sender::Assistant,
            timestamp: Utc::now(),
            kind: reply.kind,
            filename: reply.filename,
        }
    }

    /// Fields to hand to the persistence backend.
    #[must_use]
    pub fn to_new_message(&self) -> NewMessage {
        NewMessage {
            content: self.content.clone(),
            is_user: self.sender.is_user(),
            kind: self.kind,
            filename: self.filename.clone(),
        }
    }
}

/// Reply produced by the reply-fetch collaborator. Never partial.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Payload kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Payload.
    pub content: String,
    /// Attachment filename for non-text replies.
    pub filename: Option<String>,
}

impl Reply {
    /// Plain text reply.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            content: content.into(),
            filename: None,
        }
    }
}

/// Message fields sent to storage on insert.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewMessage {
    /// Payload.
    pub content: String,
    /// Whether the user authored it.
    pub is_user: bool,
    /// Payload kind.
    pub kind: MessageKind,
    /// Attachment filename.
    pub filename: Option<String>,
}

/// One page of stored messages, newest first.
#[derive(Clone, Debug, Default)]
pub struct MessagePage {
    /// Messages ordered newest first.
    pub items: Vec<Message>,
    /// Total number of messages stored for the conversation.
    pub total_count: usize,
}
