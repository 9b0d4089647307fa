//! Core chat types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;

pub use config::{
    ChatConfig, ExchangeConfig, PaginationConfig, ReplyConfig, ServerConfig, StorageConfig,
};
pub use errors::{ChatError, ChatResult};
pub use ids::{ConversationId, MessageId, RequestId, UserId};
pub use message::{Message, MessageKind, MessagePage, NewMessage, Reply, Sender};
