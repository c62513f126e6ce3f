//! Services the host application provides to scripts.

use parking_lot::Mutex;

/// Host-side collaborators outside the engine: overlay windows, transient
/// messages, the clipboard. Every method defaults to a no-op.
pub trait HostServices: Send + Sync {
    /// Closes any overlay windows scripts opened. Called on every reload.
    fn close_overlays(&self) {}

    fn toast(&self, _text: &str) {}

    fn copy_to_clipboard(&self, _text: &str) {}
}

/// Host with no services.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl HostServices for NoHost {}

/// A host call captured by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    CloseOverlays,
    Toast(String),
    Clipboard(String),
}

/// Records every call, for tests.
#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn toasts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HostCall::Toast(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }
}

impl HostServices for RecordingHost {
    fn close_overlays(&self) {
        self.calls.lock().push(HostCall::CloseOverlays);
    }

    fn toast(&self, text: &str) {
        self.calls.lock().push(HostCall::Toast(text.to_string()));
    }

    fn copy_to_clipboard(&self, text: &str) {
        self.calls.lock().push(HostCall::Clipboard(text.to_string()));
    }
}
