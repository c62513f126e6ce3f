//! Event types and watcher masks.

use crate::EventError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// A change notification delivered by the host for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// The field's text changed.
    TextChanged,
    /// The field's caret or selection moved.
    SelectionChanged,
}

impl EventType {
    /// Stable integer code handed to scripts.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::TextChanged => EventMask::TEXT_CHANGED.0,
            Self::SelectionChanged => EventMask::SELECTION_CHANGED.0,
        }
    }

    /// Decodes an integer code.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnknownEventType`] for codes other than the two
    /// known event types.
    pub fn from_code(code: u32) -> Result<Self, EventError> {
        match code {
            c if c == EventMask::TEXT_CHANGED.0 => Ok(Self::TextChanged),
            c if c == EventMask::SELECTION_CHANGED.0 => Ok(Self::SelectionChanged),
            other => Err(EventError::UnknownEventType(other)),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextChanged => write!(f, "text_changed"),
            Self::SelectionChanged => write!(f, "selection_changed"),
        }
    }
}

/// Bitmask of event types a watcher subscribes to.
///
/// A watcher fires only when `(mask & event) == event`.
///
/// ```
/// use inline_event::{EventMask, EventType};
///
/// assert!(EventMask::ALL.fires_for(EventType::SelectionChanged));
/// assert!(!EventMask::TEXT_CHANGED.fires_for(EventType::SelectionChanged));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventMask(pub u32);

impl EventMask {
    /// Text changes only. Default for `registerWatcher`.
    pub const TEXT_CHANGED: Self = Self(16);
    /// Selection changes only.
    pub const SELECTION_CHANGED: Self = Self(8192);
    /// Both event types.
    pub const ALL: Self = Self(16 | 8192);

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if a watcher with this mask fires for `event`.
    #[must_use]
    pub const fn fires_for(self, event: EventType) -> bool {
        let code = event.code();
        self.0 & code == code
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::TEXT_CHANGED
    }
}

impl From<EventType> for EventMask {
    fn from(event: EventType) -> Self {
        Self(event.code())
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
