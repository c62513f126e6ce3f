//! Persisted per-module state.
//!
//! Two things survive a restart:
//!
//! - **Lazy-load metadata**: the commands a module registered, with their
//!   description and category, recorded by `module:saveLazyLoad()`. On the
//!   next load the engine installs stubs from it instead of running the
//!   module.
//! - **Module descriptions**: free text set by `module:setDescription()`.
//!
//! Both are keyed by module key (`modules/<file>` for bundled modules, the
//! absolute path for external ones).

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Listing metadata for one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandMeta {
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Commands recorded for one module by `saveLazyLoad()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyRecord {
    pub commands: BTreeMap<String, CommandMeta>,
}

impl LazyRecord {
    /// Returns `true` if no command was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterates recorded command names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}

/// Key-value store for per-module state.
///
/// Implementations use interior mutability; the engine holds them as
/// `Arc<dyn ModuleStore>`.
pub trait ModuleStore: Send + Sync {
    /// Returns the lazy-load record for `key`, if any.
    fn lazy(&self, key: &str) -> Option<LazyRecord>;

    /// Replaces the lazy-load record for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be persisted.
    fn save_lazy(&self, key: &str, record: LazyRecord) -> Result<(), StoreError>;

    /// Forgets the lazy-load record for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the change cannot be persisted.
    fn clear_lazy(&self, key: &str) -> Result<(), StoreError>;

    /// Returns the stored description for `key`.
    fn description(&self, key: &str) -> Option<String>;

    /// Sets or (with `None`) clears the description for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the change cannot be persisted.
    fn set_description(&self, key: &str, description: Option<String>) -> Result<(), StoreError>;
}

/// On-disk and in-memory document layout shared by both stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct StoreDocument {
    lazy: BTreeMap<String, LazyRecord>,
    descriptions: BTreeMap<String, String>,
}

impl StoreDocument {
    fn set_lazy(&mut self, key: &str, record: LazyRecord) {
        if record.is_empty() {
            self.lazy.remove(key);
        } else {
            self.lazy.insert(key.to_string(), record);
        }
    }

    fn set_description(&mut self, key: &str, description: Option<String>) {
        match description {
            Some(text) => {
                self.descriptions.insert(key.to_string(), text);
            }
            None => {
                self.descriptions.remove(key);
            }
        }
    }
}
