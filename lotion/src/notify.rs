//! User-visible notifications.
//!
//! Components that cannot surface an error through a return value (the
//! background sync writer, above all) report it here. Delivery is best
//! effort: if the UI is not draining the channel the notification is
//! dropped and only the log keeps it.

use std::fmt;

use tokio::sync::mpsc;

/// Shown when a reorder could not be persisted.
pub const SAVE_ORDER_FAILED: &str = "Failed to save new order";

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Informational message.
    Info,
    /// Something the user asked for did not happen.
    Error,
}

/// A transient message for the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Text shown to the user.
    pub message: String,
}

impl Notification {
    /// An informational notification, for callers that show it directly.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    /// An error notification, for callers that show it directly.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Sending half of the notification channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// Creates a notifier and the receiver the UI drains.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Reports an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Info, message.into());
    }

    /// Reports a failure.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Error, message.into());
    }

    fn emit(&self, level: NotificationLevel, message: String) {
        if let Err(e) = self.tx.try_send(Notification { level, message }) {
            tracing::debug!(error = %e, "notification dropped");
        }
    }
}
