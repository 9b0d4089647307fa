//! Notification and navigation sinks.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chat::backends::contracts::{Navigator, NoticeKind, Notifier};

/// A notice delivered to the UI layer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    /// Severity.
    pub kind: NoticeKind,
    /// Human-readable text.
    pub message: String,
}

/// Notifier that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Warning => info!("notice ({kind}): {message}"),
            NoticeKind::Error => warn!("notice ({kind}): {message}"),
        }
    }
}

/// Notifier forwarding notices over an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    /// Create the notifier and the receiving end for the UI.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        let notice = Notice {
            kind,
            message: message.to_string(),
        };
        if self.tx.send(notice).is_err() {
            debug!("notice dropped, receiver closed: {message}");
        }
    }
}

/// Navigator that only logs the redirect.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn redirect_to_auth(&self) {
        info!("redirecting to authentication view");
    }
}

/// Navigator signalling redirects over an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<()>,
}

impl ChannelNavigator {
    /// Create the navigator and the receiving end for the router.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn redirect_to_auth(&self) {
        if self.tx.send(()).is_err() {
            debug!("auth redirect dropped, receiver closed");
        }
    }
}
