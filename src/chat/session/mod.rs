//! Conversation state, duplicate/race suppression and the exchange coordinator.

pub mod coordinator;
pub mod guard;
pub mod store;

pub use coordinator::{ChatBackends, ChatSession, DUPLICATE_NOTICE, SendOutcome, derive_title};
pub use guard::{RaceGuard, RecentSendCache, RequestToken, normalize_text};
pub use store::{ConversationSnapshot, ConversationStore, ExchangePhase, PageTicket, StoreEvent};
