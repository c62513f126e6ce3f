//! Terminal implementation of the host services scripts can call.

use inline_lua::HostServices;
use parking_lot::Mutex;

/// Toasts go to stderr. The terminal has no system clipboard or overlay
/// windows, so the clipboard is kept in memory and overlays are no-ops.
#[derive(Debug, Default)]
pub struct TerminalHost {
    clipboard: Mutex<Option<String>>,
}

impl TerminalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last text a script copied.
    pub fn clipboard(&self) -> Option<String> {
        self.clipboard.lock().clone()
    }
}

impl HostServices for TerminalHost {
    fn close_overlays(&self) {
        tracing::debug!("closing script overlays");
    }

    fn toast(&self, text: &str) {
        eprintln!("[toast] {text}");
    }

    fn copy_to_clipboard(&self, text: &str) {
        tracing::info!(chars = text.chars().count(), "copied to clipboard");
        *self.clipboard.lock() = Some(text.to_string());
    }
}
