//! User-facing progress stream.
//!
//! Producers (watch loop, per-file tasks) push [`Notification`]s into an
//! unbounded channel; a display consumer keeps only the newest lines in a
//! [`Scrollback`]. Every notification is mirrored to the `log` facade.

use chrono::{DateTime, Local};
use crossbeam::channel::{self, Receiver, Sender};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Processing,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Processing => "processing",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }

    fn level(&self) -> log::Level {
        match self {
            NotificationKind::Info | NotificationKind::Processing | NotificationKind::Success => {
                log::Level::Info
            }
            NotificationKind::Warning => log::Level::Warn,
            NotificationKind::Error => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub filename: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Notification {
            kind,
            message: message.into(),
            filename: None,
            timestamp: Local::now(),
        }
    }

    pub fn for_file(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// `[HH:MM:SS] message`, the way the log view shows it.
    pub fn line(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Cheap-to-clone producer side of the notification stream.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Notifier, Receiver<Notification>) {
        let (tx, rx) = channel::unbounded();
        (Notifier { tx }, rx)
    }

    pub fn send(&self, notification: Notification) {
        log::log!(notification.kind.level(), "{}", notification.message);
        // Nobody listening is not an error for the producer.
        let _ = self.tx.send(notification);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(Notification::new(NotificationKind::Info, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.send(Notification::new(NotificationKind::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(Notification::new(NotificationKind::Error, message));
    }

    pub fn file(&self, kind: NotificationKind, filename: &str, message: impl Into<String>) {
        self.send(Notification::new(kind, message).for_file(filename));
    }
}

/// Bounded history of rendered lines, oldest dropped first.
#[derive(Debug)]
pub struct Scrollback {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Scrollback {
    pub fn new(capacity: usize) -> Self {
        Scrollback {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, notification: &Notification) -> &str {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(notification.line());
        self.lines.back().map(String::as_str).unwrap_or_default()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All retained lines joined for a multi-line text view.
    pub fn text(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }
}
