//! Message exchange coordinator and pagination loader.
//!
//! One [`ChatSession`] drives the open conversation of one view. Every
//! collaborator call is a suspension point; the session lock is released
//! before each one and results are checked against the race guard when they
//! come back. In-flight calls are never aborted, stale results are dropped.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info, warn};

use crate::chat::backends::contracts::{
    MessageStore, Navigator, NoticeKind, Notifier, ReplyFetcher,
};
use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{ConversationId, MessageId, UserId};
use crate::chat::core::message::{Message, Reply};
use crate::chat::session::guard::{RaceGuard, RecentSendCache, RequestToken};
use crate::chat::session::store::{
    ConversationSnapshot, ConversationStore, ExchangePhase, StoreEvent,
};

/// Notice shown when identical text is resent too quickly.
pub const DUPLICATE_NOTICE: &str =
    "Duplicate message, please wait a moment before sending it again.";

/// Collaborators of a chat session.
#[derive(Clone)]
pub struct ChatBackends {
    /// Persistence collaborator.
    pub messages: Arc<dyn MessageStore>,
    /// Reply-fetch collaborator.
    pub replies: Arc<dyn ReplyFetcher>,
    /// Notification collaborator.
    pub notifier: Arc<dyn Notifier>,
    /// Navigation collaborator.
    pub navigator: Arc<dyn Navigator>,
}

/// How a call to [`ChatSession::send`] ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// Empty text, nothing open, or an exchange already running.
    Ignored,
    /// The reply was appended.
    Replied,
    /// The reply failed and the fallback message was appended.
    Fallback,
    /// The view moved on before the reply arrived; nothing was committed.
    Discarded,
}

/// Build the automatic title from the first user message.
#[must_use]
pub fn derive_title(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut title: String = text.chars().take(max_chars).collect();
        title.push_str("...");
        title
    } else {
        text.to_string()
    }
}

struct SessionState {
    store: ConversationStore,
    guard: RaceGuard,
}

/// Coordinator for the open conversation of one chat view.
pub struct ChatSession {
    config: ChatConfig,
    backends: ChatBackends,
    recent_sends: RecentSendCache,
    state: Mutex<SessionState>,
}

impl ChatSession {
    /// Create a session with nothing open.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ChatConfig, backends: ChatBackends) -> ChatResult<Self> {
        config.validate()?;
        let recent_sends = RecentSendCache::from_config(&config.exchange);
        let store = ConversationStore::new(config.exchange.default_title.clone());

        Ok(Self {
            config,
            backends,
            recent_sends,
            state: Mutex::new(SessionState {
                store,
                guard: RaceGuard::default(),
            }),
        })
    }

    /// Open a conversation for `user`, creating one when `conversation` is `None`.
    ///
    /// Loads the newest page before returning.
    ///
    /// # Errors
    /// Returns [`ChatError::NotAuthenticated`] without a user, or the
    /// persistence error if a new conversation cannot be created.
    pub async fn open(
        &self,
        user: Option<UserId>,
        conversation: Option<ConversationId>,
    ) -> ChatResult<ConversationId> {
        let Some(user_id) = user else {
            self.backends.navigator.redirect_to_auth();
            return Err(ChatError::NotAuthenticated);
        };

        let conversation_id = match conversation {
            Some(id) => id,
            None => match self.backends.messages.create_conversation(user_id).await {
                Ok(id) => {
                    info!("Created conversation {id} for user {user_id}");
                    id
                }
                Err(err) => {
                    error!("Failed to create conversation: {err}");
                    self.backends
                        .notifier
                        .notify(NoticeKind::Error, "Could not start a new conversation.");
                    return Err(err);
                }
            },
        };

        let stored_title = match self
            .backends
            .messages
            .conversation_title(conversation_id)
            .await
        {
            Ok(title) => title,
            Err(err) => {
                warn!("Failed to read title of {conversation_id}: {err}");
                None
            }
        };

        {
            let mut state = self.state.lock().await;
            state.guard.invalidate();
            state.store.reset(Some(conversation_id));
            if let Some(title) = stored_title {
                state.store.set_title(title);
            }
        }
        debug!("Opened conversation {conversation_id}");

        self.load_more().await;
        Ok(conversation_id)
    }

    /// Close the open conversation; pending results will be discarded.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.guard.invalidate();
        state.store.clear();
    }

    /// Run one user turn: optimistic append, persist, fetch reply, persist reply.
    ///
    /// # Errors
    /// Returns [`ChatError::DuplicateSubmission`] when the same text was sent
    /// within the duplicate window. Collaborator failures never surface here.
    pub async fn send(&self, text: &str) -> ChatResult<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        let (token, user_message, first_message) = {
            let mut state = self.state.lock().await;
            let Some(conversation_id) = state.store.conversation_id() else {
                return Ok(SendOutcome::Ignored);
            };
            if state.store.phase().is_generating() {
                return Ok(SendOutcome::Ignored);
            }
            if let Err(err) = self.recent_sends.check_and_record(text) {
                self.backends
                    .notifier
                    .notify(NoticeKind::Warning, DUPLICATE_NOTICE);
                return Err(err);
            }

            let token = state.guard.issue(conversation_id);
            let first_message = !state.store.has_user_message();
            let message = Message::user(text);
            state.store.append_message(message.clone());
            state.store.set_phase(ExchangePhase::Sending);
            (token, message, first_message)
        };
        debug!(
            "Sending request {} in conversation {}",
            token.request_id, token.conversation_id
        );

        // The reply is committed as soon as it arrives; only its insert waits
        // for the user message so stored order matches shown order.
        let persist = self.persist_user_message(&token, &user_message, first_message);
        let reply = async {
            self.set_phase_if_current(&token, ExchangePhase::AwaitingReply)
                .await;
            let reply = self.backends.replies.fetch_reply(text.to_string()).await;
            self.commit_reply(&token, reply).await
        };
        let ((), (outcome, committed)) = tokio::join!(persist, reply);

        if let Some(message) = committed {
            self.persist_assistant_message(token.conversation_id, message)
                .await;
        }
        Ok(outcome)
    }

    async fn set_phase_if_current(&self, token: &RequestToken, phase: ExchangePhase) {
        let mut state = self.state.lock().await;
        if state.guard.is_current(token, state.store.conversation_id()) {
            state.store.set_phase(phase);
        }
    }

    async fn persist_user_message(
        &self,
        token: &RequestToken,
        message: &Message,
        first_message: bool,
    ) {
        let conversation_id = token.conversation_id;
        let persisted_id = match self
            .backends
            .messages
            .insert_message(conversation_id, message.to_new_message())
            .await
        {
            Ok(id) => id,
            Err(err) => {
                warn!("Failed to persist user message in {conversation_id}: {err}");
                return;
            }
        };

        let title = derive_title(&message.content, self.config.exchange.title_max_chars);
        let still_shown = {
            let mut state = self.state.lock().await;
            state
                .store
                .replace_id(&message.id, MessageId::persisted(persisted_id));

            if !first_message {
                return;
            }
            let still_shown = state.store.conversation_id() == Some(conversation_id);
            if still_shown {
                if !state.store.title_is_default() {
                    return;
                }
                state.store.set_title(title.clone());
            }
            still_shown
        };

        // The view moved on: only storage can tell whether a title exists.
        if !still_shown {
            match self
                .backends
                .messages
                .conversation_title(conversation_id)
                .await
            {
                Ok(None) => {}
                Ok(Some(_)) => return,
                Err(err) => {
                    warn!("Failed to read title of {conversation_id}: {err}");
                    return;
                }
            }
        }

        if let Err(err) = self
            .backends
            .messages
            .update_conversation_title(conversation_id, title)
            .await
        {
            warn!("Failed to store title for {conversation_id}: {err}");
        }
    }

    /// Append the reply, or the fallback, if `token` is still current.
    ///
    /// Returns the committed message so the caller can persist it.
    async fn commit_reply(
        &self,
        token: &RequestToken,
        reply: ChatResult<Reply>,
    ) -> (SendOutcome, Option<Message>) {
        let (message, outcome) = {
            let mut state = self.state.lock().await;
            if !state.guard.is_current(token, state.store.conversation_id()) {
                debug!(
                    "Discarding stale reply for request {} (conversation {})",
                    token.request_id, token.conversation_id
                );
                return (SendOutcome::Discarded, None);
            }

            let (message, outcome) = match reply {
                Ok(reply) => (Message::assistant(reply), SendOutcome::Replied),
                Err(err) => {
                    error!("Reply fetch failed for request {}: {err}", token.request_id);
                    let fallback = Reply::text(self.config.exchange.fallback_message.clone());
                    (Message::assistant(fallback), SendOutcome::Fallback)
                }
            };

            state.store.append_message(message.clone());
            state.store.set_phase(ExchangePhase::Idle);
            state.guard.complete(token);
            (message, outcome)
        };

        if outcome == SendOutcome::Fallback {
            self.backends.notifier.notify(
                NoticeKind::Error,
                "Something went wrong while generating a reply.",
            );
        }
        (outcome, Some(message))
    }

    async fn persist_assistant_message(&self, conversation_id: ConversationId, message: Message) {
        match self
            .backends
            .messages
            .insert_message(conversation_id, message.to_new_message())
            .await
        {
            Ok(id) => {
                let mut state = self.state.lock().await;
                state.store.replace_id(&message.id, MessageId::persisted(id));
            }
            Err(err) => warn!("Failed to persist assistant message in {conversation_id}: {err}"),
        }
    }

    /// Load the next older page. Returns whether a page was committed.
    ///
    /// No collaborator call is made while a load is running or when no
    /// older messages remain.
    pub async fn load_more(&self) -> bool {
        let ticket = {
            let mut state = self.state.lock().await;
            match state.store.begin_loading() {
                Some(ticket) => ticket,
                None => return false,
            }
        };

        let result = self
            .backends
            .messages
            .list_messages(
                ticket.conversation_id,
                ticket.page,
                self.config.pagination.page_size,
            )
            .await;

        let mut state = self.state.lock().await;
        if !state.store.accepts(&ticket) {
            debug!(
                "Discarding page {} of conversation {}",
                ticket.page, ticket.conversation_id
            );
            return false;
        }

        match result {
            Ok(page) => {
                let inserted = state.store.prepend_page(page.items, page.total_count);
                debug!(
                    "Loaded page {} of {} ({inserted} new messages)",
                    ticket.page, ticket.conversation_id
                );
                true
            }
            Err(err) => {
                state.store.finish_loading();
                warn!(
                    "Failed to load page {} of {}: {err}",
                    ticket.page, ticket.conversation_id
                );
                false
            }
        }
    }

    /// Owned copy of the open conversation.
    pub async fn snapshot(&self) -> ConversationSnapshot {
        self.state.lock().await.store.snapshot()
    }

    /// Subscribe to store change notifications.
    pub async fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.state.lock().await.store.subscribe()
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }
}
