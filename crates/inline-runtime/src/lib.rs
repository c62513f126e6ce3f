//! Host-side infrastructure for the inline script engine.
//!
//! Nothing in this crate touches Lua. It provides the pieces a host wires
//! into the engine:
//!
//! | Module | Provides |
//! |--------|----------|
//! | [`config`] | Layered TOML configuration (`~/.inline`, project, `INLINE_*` env) |
//! | [`store`] | Persisted lazy-load metadata and module descriptions |
//! | [`notify`] | Non-fatal notification channel for script failures |

pub mod config;
pub mod notify;
pub mod store;

pub use config::{ConfigError, ConfigLoader, ConfigResolver, InlineConfig};
pub use notify::{Notification, NotificationSource, Notifier, RecordingNotifier, TracingNotifier};
pub use store::{CommandMeta, JsonFileStore, LazyRecord, MemoryStore, ModuleStore, StoreError};
