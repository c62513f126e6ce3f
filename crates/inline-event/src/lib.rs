//! Field events for the inline script engine.
//!
//! This crate holds the leaf value types shared by the runtime and the
//! Lua engine:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Host (text source)                      │
//! │   delivers (field, event, text) signals serially            │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  inline-event   : EventType, EventMask, TextField  ◄── HERE │
//! │  inline-runtime : config, module store, notifications       │
//! │  inline-lua     : environment, loader, dispatcher           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Event Types
//!
//! | Type | Code | Delivered to |
//! |------|------|--------------|
//! | [`EventType::TextChanged`] | 16 | watchers, then the dispatcher |
//! | [`EventType::SelectionChanged`] | 8192 | watchers only |
//!
//! The integer codes are part of the script-facing contract: scripts pass
//! raw masks to `registerWatcher`.
//!
//! # Fields
//!
//! [`TextField`] is the opaque accessor the engine uses to read and write a
//! live editable field. [`MemoryField`] is an in-process implementation.

mod error;
mod event;
mod field;

pub use error::EventError;
pub use event::{EventMask, EventType};
pub use field::{FieldId, MemoryField, TextField};
