//! Collaborators of the chat session: contracts and concrete backends.

pub mod contracts;
pub mod http;
pub mod notify;
pub mod sqlite;

pub use contracts::{BackendFuture, MessageStore, Navigator, NoticeKind, Notifier, ReplyFetcher};
pub use http::HttpReplyFetcher;
pub use notify::{ChannelNavigator, ChannelNotifier, Notice, TracingNavigator, TracingNotifier};
pub use sqlite::SqliteMessageStore;
