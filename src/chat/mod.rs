//! Chat session core for the chatline front end.
//!
//! This module coordinates the message list of one open conversation:
//! - `core`: Configuration, errors, IDs and the message model
//! - `session`: State store, duplicate/race suppression, exchange coordinator and pagination
//! - `backends`: Collaborator contracts and their `SQLite`, HTTP and channel implementations
//! - `adapters`: Wiring helpers (tracing, default backends)

pub mod adapters;
pub mod backends;
pub mod core;
pub mod session;

pub use adapters::{default_backends, init_tracing};
pub use backends::{
    BackendFuture, ChannelNavigator, ChannelNotifier, HttpReplyFetcher, MessageStore, Navigator,
    Notice, NoticeKind, Notifier, ReplyFetcher, SqliteMessageStore, TracingNavigator,
    TracingNotifier,
};
pub use self::core::{
    ChatConfig, ChatError, ChatResult, ConversationId, ExchangeConfig, Message, MessageId,
    MessageKind, MessagePage, NewMessage, PaginationConfig, Reply, ReplyConfig, RequestId,
    Sender, ServerConfig, StorageConfig, UserId,
};
pub use session::{
    ChatBackends, ChatSession, ConversationSnapshot, ConversationStore, ExchangePhase,
    SendOutcome, StoreEvent,
};
