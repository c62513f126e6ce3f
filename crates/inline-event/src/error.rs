//! Event decoding errors.

use thiserror::Error;

/// Errors produced while decoding raw event values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The integer does not name a known event type.
    #[error("unknown event type code: {0}")]
    UnknownEventType(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contains_code() {
        let err = EventError::UnknownEventType(42);
        assert!(err.to_string().contains("42"));
    }
}
