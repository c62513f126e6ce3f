//! Non-fatal notification channel.
//!
//! Script failures never crash the host. The engine reports each one as a
//! [`Notification`] naming where it happened (`source`) and what failed
//! (`key`: a module key, command name or timer id), then carries on.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a failure was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSource {
    /// Module compile/execute, or the load sequence as a whole.
    Load,
    Command,
    Watcher,
    Finder,
    /// Scheduled task.
    Timer,
}

impl fmt::Display for NotificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Load => "load",
            Self::Command => "command",
            Self::Watcher => "watcher",
            Self::Finder => "finder",
            Self::Timer => "timer",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub source: NotificationSource,
    pub key: String,
    pub message: String,
}

impl Notification {
    pub fn new(
        source: NotificationSource,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.key, self.message)
    }
}

/// Receives non-fatal failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Logs every notification at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        tracing::warn!(source = %n.source, key = %n.key, "{}", n.message);
    }
}

/// Collects notifications in memory, and also logs them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, n: Notification) {
        TracingNotifier.notify(n.clone());
        self.seen.lock().push(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_source_and_key() {
        let n = Notification::new(NotificationSource::Command, "upper", "boom");
        assert_eq!(n.to_string(), "[command] upper: boom");
    }

    #[test]
    fn recording_notifier_collects_and_drains() {
        let rec = RecordingNotifier::new();
        assert!(rec.is_empty());

        rec.notify(Notification::new(NotificationSource::Load, "a.lua", "syntax"));
        rec.notify(Notification::new(NotificationSource::Finder, "finder#1", "oops"));
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.snapshot()[1].source, NotificationSource::Finder);

        let drained = rec.drain();
        assert_eq!(drained.len(), 2);
        assert!(rec.is_empty());
    }
}
