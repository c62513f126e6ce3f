//! Text field accessor.
//!
//! The engine never owns a field. It reads and writes through [`TextField`],
//! which the host implements over its real widget. Positions are counted in
//! `char`s, not bytes.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Host-assigned identity of an editable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u64);

impl FieldId {
    /// Allocates a process-unique identifier.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field#{}", self.0)
    }
}

/// Read/write access to one live editable field.
///
/// Implementations use interior mutability: the engine shares fields as
/// `Arc<dyn TextField>` between the dispatcher, queries and scripts.
pub trait TextField: Send + Sync {
    /// Returns the field identity.
    fn id(&self) -> FieldId;

    /// Returns the current text.
    fn text(&self) -> String;

    /// Replaces the whole text.
    fn set_text(&self, text: &str);

    /// Returns the selection start (caret position when collapsed).
    fn selection_start(&self) -> usize;

    /// Returns the selection end.
    fn selection_end(&self) -> usize;

    /// Moves the selection. Out-of-range positions are clamped.
    fn set_selection(&self, start: usize, end: usize);
}

#[derive(Debug, Default)]
struct FieldState {
    text: String,
    selection: (usize, usize),
}

impl FieldState {
    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn clamp_selection(&mut self) {
        let len = self.char_len();
        let (start, end) = self.selection;
        self.selection = (start.min(len), end.min(len));
    }
}

/// In-memory [`TextField`].
///
/// Setting the text keeps the selection where it was, clamped to the new
/// length. A freshly created field has its caret at the end of its text.
#[derive(Debug)]
pub struct MemoryField {
    id: FieldId,
    state: Mutex<FieldState>,
}

impl MemoryField {
    /// Creates a field holding `text` with the caret at the end.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.chars().count();
        Self {
            id: FieldId::next(),
            state: Mutex::new(FieldState {
                text,
                selection: (len, len),
            }),
        }
    }

    /// Creates an empty field.
    #[must_use]
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Replaces the text and puts the caret at the end, like a user typing.
    pub fn type_text(&self, text: &str) {
        let mut state = self.state.lock();
        state.text = text.to_string();
        let len = state.char_len();
        state.selection = (len, len);
    }

    /// Returns `(start, end)` of the current selection.
    #[must_use]
    pub fn selection(&self) -> (usize, usize) {
        self.state.lock().selection
    }
}

impl Default for MemoryField {
    fn default() -> Self {
        Self::empty()
    }
}

impl TextField for MemoryField {
    fn id(&self) -> FieldId {
        self.id
    }

    fn text(&self) -> String {
        self.state.lock().text.clone()
    }

    fn set_text(&self, text: &str) {
        let mut state = self.state.lock();
        state.text = text.to_string();
        state.clamp_selection();
    }

    fn selection_start(&self) -> usize {
        self.state.lock().selection.0
    }

    fn selection_end(&self) -> usize {
        self.state.lock().selection.1
    }

    fn set_selection(&self, start: usize, end: usize) {
        let mut state = self.state.lock();
        state.selection = (start, end);
        state.clamp_selection();
    }
}
