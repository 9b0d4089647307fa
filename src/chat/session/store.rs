//! Conversation state store: the visible message list of the open conversation.
//!
//! The store is a plain owned value. [`ChatSession`](super::ChatSession) keeps
//! it behind a lock and never holds that lock across a collaborator call, so
//! every mutation here is a synchronous commit.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::chat::core::ids::{ConversationId, MessageId};
use crate::chat::core::message::{Message, Sender};

/// Capacity of the store event channel.
const EVENT_CAPACITY: usize = 64;

/// Exchange state of the open conversation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangePhase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// User message appended, reply not requested yet.
    Sending,
    /// Waiting for the reply service.
    AwaitingReply,
}

impl ExchangePhase {
    /// Whether a reply is being produced.
    #[must_use]
    pub const fn is_generating(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Change notifications for the consuming view.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreEvent {
    /// The store now shows `conversation_id` (or nothing).
    Reset {
        /// Newly active conversation.
        conversation_id: Option<ConversationId>,
    },
    /// A message was added at the end.
    MessageAppended {
        /// Id of the new message.
        id: MessageId,
        /// The view should scroll to the newest message.
        scroll_to_bottom: bool,
    },
    /// A temporary id was swapped for a persisted one.
    IdReplaced {
        /// Previous id.
        from: MessageId,
        /// New id.
        to: MessageId,
    },
    /// An older page was inserted at the front.
    PageLoaded {
        /// Number of messages inserted.
        count: usize,
        /// Only the first page of a conversation scrolls.
        scroll_to_bottom: bool,
    },
    /// Exchange phase changed.
    PhaseChanged(ExchangePhase),
    /// Title changed.
    TitleChanged(String),
}

/// Owned view of the store for rendering.
#[derive(Clone, Debug, Serialize)]
pub struct ConversationSnapshot {
    /// Active conversation.
    pub conversation_id: Option<ConversationId>,
    /// Current title.
    pub title: String,
    /// Messages, oldest first.
    pub messages: Vec<Message>,
    /// Exchange phase.
    pub phase: ExchangePhase,
    /// Whether older pages remain.
    pub has_more: bool,
    /// Whether a page load is in flight.
    pub loading: bool,
}

/// Ticket handed out when a page load starts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageTicket {
    /// Conversation the page belongs to.
    pub conversation_id: ConversationId,
    /// Page index to request.
    pub page: usize,
    epoch: u64,
}

/// Single source of truth for the open conversation.
#[derive(Debug)]
pub struct ConversationStore {
    conversation_id: Option<ConversationId>,
    default_title: String,
    title: String,
    messages: Vec<Message>,
    page: usize,
    has_more: bool,
    loading: bool,
    initial_load_complete: bool,
    phase: ExchangePhase,
    epoch: u64,
    events: broadcast::Sender<StoreEvent>,
}

impl ConversationStore {
    /// Create an unmounted store.
    #[must_use]
    pub fn new(default_title: impl Into<String>) -> Self {
        let default_title = default_title.into();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            conversation_id: None,
            title: default_title.clone(),
            default_title,
            messages: Vec::new(),
            page: 0,
            has_more: false,
            loading: false,
            initial_load_complete: false,
            phase: ExchangePhase::Idle,
            epoch: 0,
            events,
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscriber is fine.
        let _ = self.events.send(event);
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Show `conversation_id` with an empty list. No-op for `None`.
    pub fn reset(&mut self, conversation_id: Option<ConversationId>) -> bool {
        let Some(id) = conversation_id else {
            return false;
        };
        self.clear_to(Some(id));
        true
    }

    /// Return to the unmounted state.
    pub fn clear(&mut self) {
        self.clear_to(None);
    }

    fn clear_to(&mut self, conversation_id: Option<ConversationId>) {
        self.conversation_id = conversation_id;
        self.title.clone_from(&self.default_title);
        self.messages.clear();
        self.page = 0;
        self.has_more = conversation_id.is_some();
        self.loading = false;
        self.initial_load_complete = false;
        self.phase = ExchangePhase::Idle;
        self.epoch = self.epoch.wrapping_add(1);
        self.emit(StoreEvent::Reset { conversation_id });
    }

    /// Add a message at the end. Rejected if its id is already shown.
    pub fn append_message(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            debug!("Skipping append of already present message {}", message.id);
            return false;
        }
        let id = message.id.clone();
        self.messages.push(message);
        self.emit(StoreEvent::MessageAppended {
            id,
            scroll_to_bottom: true,
        });
        true
    }

    /// Swap `temp_id` for `real_id` in place.
    ///
    /// If `real_id` is already present (a page load brought the stored copy
    /// in first), the temporary message is dropped instead so ids stay unique.
    pub fn replace_id(&mut self, temp_id: &MessageId, real_id: MessageId) -> bool {
        let Some(index) = self.messages.iter().position(|m| &m.id == temp_id) else {
            return false;
        };

        if self.contains(&real_id) {
            self.messages.remove(index);
        } else {
            self.messages[index].id = real_id.clone();
        }
        self.emit(StoreEvent::IdReplaced {
            from: temp_id.clone(),
            to: real_id,
        });
        true
    }

    /// Insert an older page, given newest first, at the front.
    ///
    /// Messages already shown are skipped; the page cursor advances and
    /// `has_more` compares the persisted messages shown with `total_count`.
    /// Optimistic messages that never reached storage are not counted.
    pub fn prepend_page(&mut self, newest_first: Vec<Message>, total_count: usize) -> usize {
        let mut older: Vec<Message> = Vec::with_capacity(newest_first.len());
        for message in newest_first.into_iter().rev() {
            if !self.contains(&message.id) && !older.iter().any(|m| m.id == message.id) {
                older.push(message);
            }
        }

        let count = older.len();
        older.append(&mut self.messages);
        self.messages = older;
        self.page += 1;
        self.has_more = self.persisted_count() < total_count;
        self.loading = false;

        let scroll_to_bottom = !self.initial_load_complete;
        self.initial_load_complete = true;
        self.emit(StoreEvent::PageLoaded {
            count,
            scroll_to_bottom,
        });
        count
    }

    /// Mark a page load as started. `None` when one is running or nothing is left.
    pub fn begin_loading(&mut self) -> Option<PageTicket> {
        let conversation_id = self.conversation_id?;
        if self.loading || !self.has_more {
            return None;
        }
        self.loading = true;
        Some(PageTicket {
            conversation_id,
            page: self.page,
            epoch: self.epoch,
        })
    }

    /// Whether `ticket` still belongs to what the store shows.
    #[must_use]
    pub const fn accepts(&self, ticket: &PageTicket) -> bool {
        self.epoch == ticket.epoch
    }

    /// Mark the running page load as finished without committing anything.
    pub fn finish_loading(&mut self) {
        self.loading = false;
    }

    /// Update the exchange phase.
    pub fn set_phase(&mut self, phase: ExchangePhase) {
        if self.phase != phase {
            self.phase = phase;
            self.emit(StoreEvent::PhaseChanged(phase));
        }
    }

    /// Update the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.emit(StoreEvent::TitleChanged(self.title.clone()));
    }

    /// Whether the title is still the placeholder.
    #[must_use]
    pub fn title_is_default(&self) -> bool {
        self.title == self.default_title
    }

    /// Number of shown messages that carry a storage id.
    #[must_use]
    pub fn persisted_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.id.is_temporary()).count()
    }

    /// Whether a message with `id` is shown.
    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    /// Whether the user has written anything in the shown history.
    #[must_use]
    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.sender == Sender::User)
    }

    /// Active conversation.
    #[must_use]
    pub const fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation_id
    }

    /// Messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Exchange phase.
    #[must_use]
    pub const fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// Whether older pages remain.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether a page load is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Owned copy for rendering.
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            conversation_id: self.conversation_id,
            title: self.title.clone(),
            messages: self.messages.clone(),
            phase: self.phase,
            has_more: self.has_more,
            loading: self.loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::message::Reply;

    fn persisted(id: &str, content: &str) -> Message {
        let mut message = Message::user(content);
        message.id = MessageId::persisted(id);
        message
    }

    fn mounted() -> ConversationStore {
        let mut store = ConversationStore::new("New Chat");
        store.reset(Some(ConversationId::new()));
        store
    }

    #[test]
    fn test_reset_none_is_noop() {
        let mut store = mounted();
        store.append_message(Message::user("hello"));
        let before = store.conversation_id();

        assert!(!store.reset(None));
        assert_eq!(store.conversation_id(), before);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut store = mounted();
        store.append_message(Message::user("hello"));
        store.set_phase(ExchangePhase::AwaitingReply);
        store.set_title("Custom");

        let next = ConversationId::new();
        assert!(store.reset(Some(next)));
        assert_eq!(store.conversation_id(), Some(next));
        assert!(store.messages().is_empty());
        assert_eq!(store.phase(), ExchangePhase::Idle);
        assert!(store.title_is_default());
        assert!(store.has_more());
    }

    #[test]
    fn test_append_rejects_duplicate_id() {
        let mut store = mounted();
        let message = persisted("7", "hi");
        assert!(store.append_message(message.clone()));
        assert!(!store.append_message(message));
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_replace_id_updates_exactly_one() {
        let mut store = mounted();
        let first = Message::user("one");
        let second = Message::user("two");
        let temp = first.id.clone();
        store.append_message(first);
        store.append_message(second.clone());

        assert!(store.replace_id(&temp, MessageId::persisted("42")));
        assert_eq!(store.messages()[0].id, MessageId::persisted("42"));
        assert_eq!(store.messages()[1].id, second.id);
    }

    #[test]
    fn test_replace_id_unknown_is_noop() {
        let mut store = mounted();
        store.append_message(Message::user("one"));
        assert!(!store.replace_id(&MessageId::temporary(), MessageId::persisted("1")));
        assert!(store.messages()[0].id.is_temporary());
    }

    #[test]
    fn test_replace_id_drops_temp_when_real_already_loaded() {
        let mut store = mounted();
        let optimistic = Message::user("hello");
        let temp = optimistic.id.clone();
        store.append_message(optimistic);
        store.prepend_page(vec![persisted("42", "hello")], 1);

        store.replace_id(&temp, MessageId::persisted("42"));
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].id, MessageId::persisted("42"));
    }

    #[test]
    fn test_prepend_page_orders_and_skips_known() {
        let mut store = mounted();
        store.append_message(persisted("5", "latest"));

        let page = vec![
            persisted("5", "latest"),
            persisted("4", "four"),
            persisted("3", "three"),
        ];
        let inserted = store.prepend_page(page, 5);

        assert_eq!(inserted, 2);
        let ids: Vec<String> = store.messages().iter().map(|m| m.id.to_string()).collect();
        assert_eq!(ids, ["3", "4", "5"]);
        assert!(store.has_more());
    }

    #[test]
    fn test_prepend_page_updates_has_more() {
        let mut store = mounted();
        store.prepend_page(vec![persisted("2", "b"), persisted("1", "a")], 2);
        assert!(!store.has_more());
        assert!(store.begin_loading().is_none());
    }

    #[test]
    fn test_has_more_ignores_unpersisted_messages() {
        let mut store = mounted();
        store.prepend_page(vec![persisted("4", "d"), persisted("3", "c")], 4);
        for text in ["offline one", "offline two", "offline three"] {
            store.append_message(Message::user(text));
        }

        store.prepend_page(vec![persisted("2", "b")], 4);
        assert_eq!(store.persisted_count(), 3);
        assert_eq!(store.messages().len(), 6);
        assert!(store.has_more());

        store.prepend_page(vec![persisted("1", "a")], 4);
        assert!(!store.has_more());
    }

    #[test]
    fn test_only_first_page_scrolls() {
        let mut store = mounted();
        let mut events = store.subscribe();

        store.prepend_page(vec![persisted("3", "c")], 3);
        store.prepend_page(vec![persisted("2", "b")], 3);

        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::PageLoaded {
                count: 1,
                scroll_to_bottom: true
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::PageLoaded {
                count: 1,
                scroll_to_bottom: false
            }
        );
    }

    #[test]
    fn test_append_requests_scroll() {
        let mut store = mounted();
        let mut events = store.subscribe();
        let message = Message::assistant(Reply::text("hi"));
        let id = message.id.clone();
        store.append_message(message);

        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::MessageAppended {
                id,
                scroll_to_bottom: true
            }
        );
    }

    #[test]
    fn test_begin_loading_is_exclusive() {
        let mut store = mounted();
        let ticket = store.begin_loading().unwrap();
        assert_eq!(ticket.page, 0);
        assert!(store.begin_loading().is_none());
        store.finish_loading();
        assert!(store.begin_loading().is_some());
    }

    #[test]
    fn test_ticket_invalidated_by_reset_to_same_conversation() {
        let mut store = mounted();
        let id = store.conversation_id();
        let ticket = store.begin_loading().unwrap();
        store.reset(id);
        assert!(!store.accepts(&ticket));
    }

    #[test]
    fn test_unmounted_store_never_loads() {
        let mut store = ConversationStore::new("New Chat");
        assert!(store.begin_loading().is_none());
    }
}
