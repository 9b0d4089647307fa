//! Duplicate-send and stale-reply suppression.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::chat::core::config::ExchangeConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{ConversationId, RequestId};

/// Normalize text for duplicate detection (trim, lowercase).
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Recently sent texts keyed by normalized content.
///
/// Keys are text only, not conversation: the same text sent to two
/// conversations inside the window is still a duplicate.
#[derive(Debug)]
pub struct RecentSendCache {
    entries: DashMap<String, Instant>,
    window: Duration,
    ttl: Duration,
}

impl RecentSendCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(window: Duration, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
            ttl,
        }
    }

    /// Create a cache from exchange settings.
    #[must_use]
    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self::new(config.duplicate_window(), config.recent_send_ttl())
    }

    /// Reject `text` if it was sent inside the window, otherwise record it.
    ///
    /// # Errors
    /// Returns [`ChatError::DuplicateSubmission`] for a repeat inside the window.
    pub fn check_and_record(&self, text: &str) -> ChatResult<()> {
        let key = normalize_text(text);
        let now = Instant::now();

        if let Some(sent_at) = self.entries.get(&key)
            && now.duration_since(*sent_at) < self.window
        {
            return Err(ChatError::DuplicateSubmission);
        }

        self.evict_older_than(now);
        self.entries.insert(key, now);
        Ok(())
    }

    fn evict_older_than(&self, now: Instant) {
        let before = self.entries.len();
        self.entries
            .retain(|_, sent_at| now.duration_since(*sent_at) < self.ttl);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("Evicted {evicted} recent-send entries");
        }
    }

    /// Number of remembered texts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identity of one in-flight exchange.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RequestToken {
    /// Unique request id.
    pub request_id: RequestId,
    /// Conversation active when the request started.
    pub conversation_id: ConversationId,
}

/// Holder of the single active request token.
#[derive(Debug, Default)]
pub struct RaceGuard {
    active: Option<RequestToken>,
}

impl RaceGuard {
    /// Issue a fresh token, superseding any previous one.
    pub fn issue(&mut self, conversation_id: ConversationId) -> RequestToken {
        let token = RequestToken {
            request_id: RequestId::new(),
            conversation_id,
        };
        if let Some(previous) = self.active.replace(token) {
            debug!("Request {} superseded by {}", previous.request_id, token.request_id);
        }
        token
    }

    /// Whether results of `token` may be committed while `active_conversation` is shown.
    #[must_use]
    pub fn is_current(
        &self,
        token: &RequestToken,
        active_conversation: Option<ConversationId>,
    ) -> bool {
        self.active.as_ref() == Some(token) && active_conversation == Some(token.conversation_id)
    }

    /// Retire `token` once its results are committed.
    pub fn complete(&mut self, token: &RequestToken) {
        if self.active.as_ref() == Some(token) {
            self.active = None;
        }
    }

    /// Drop the active token so its completion is discarded.
    pub fn invalidate(&mut self) {
        if let Some(token) = self.active.take() {
            debug!("Request {} invalidated", token.request_id);
        }
    }

    /// Currently active token.
    #[must_use]
    pub const fn active(&self) -> Option<&RequestToken> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> RecentSendCache {
        RecentSendCache::from_config(&ExchangeConfig::default())
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize_text("  Hello World \n"), "hello world");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_inside_window_is_rejected() {
        let cache = cache();
        assert!(cache.check_and_record("Hello").is_ok());
        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(matches!(
            cache.check_and_record("  hello "),
            Err(ChatError::DuplicateSubmission)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_text_allowed_after_window() {
        let cache = cache();
        cache.check_and_record("hello").unwrap();
        tokio::time::advance(Duration::from_millis(5_000)).await;
        assert!(cache.check_and_record("hello").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entries_evicted_on_write() {
        let cache = cache();
        cache.check_and_record("first").unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.check_and_record("second").unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_send_does_not_refresh_timestamp() {
        let cache = cache();
        cache.check_and_record("hello").unwrap();
        tokio::time::advance(Duration::from_millis(3_000)).await;
        assert!(cache.check_and_record("hello").is_err());
        tokio::time::advance(Duration::from_millis(2_000)).await;
        assert!(cache.check_and_record("hello").is_ok());
    }

    #[test]
    fn test_new_token_supersedes_previous() {
        let mut guard = RaceGuard::default();
        let conversation = ConversationId::new();
        let first = guard.issue(conversation);
        let second = guard.issue(conversation);

        assert!(!guard.is_current(&first, Some(conversation)));
        assert!(guard.is_current(&second, Some(conversation)));
    }

    #[test]
    fn test_token_rejected_after_conversation_change() {
        let mut guard = RaceGuard::default();
        let conversation = ConversationId::new();
        let token = guard.issue(conversation);

        assert!(!guard.is_current(&token, Some(ConversationId::new())));
        assert!(!guard.is_current(&token, None));
    }

    #[test]
    fn test_invalidate_and_complete() {
        let mut guard = RaceGuard::default();
        let conversation = ConversationId::new();
        let token = guard.issue(conversation);
        guard.invalidate();
        assert!(!guard.is_current(&token, Some(conversation)));

        let token = guard.issue(conversation);
        guard.complete(&token);
        assert!(guard.active().is_none());
    }
}
