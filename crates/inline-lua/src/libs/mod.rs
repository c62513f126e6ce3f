//! Built-in libraries available through `require`.
//!
//! | Name | Module | Contents |
//! |------|--------|----------|
//! | `json` | [`json`] | `dump`, `load`, `null` |
//! | `iutf8` | [`iutf8`] | char-indexed string helpers |
//! | `utils` | [`utils`] | `split`, `escape`, `parseArgs`, `command`, `hasArgs` |
//!
//! [`LibraryResolver`] maps short names to factories. The builtin searcher
//! installed by [`LuaEnv`](crate::LuaEnv) consults it; names it does not know
//! fall through to the filesystem searcher.

pub mod iutf8;
pub mod json;
pub mod tokenizer;
pub mod utils;

use mlua::{Lua, Table};
use std::collections::BTreeMap;

/// Builds a library table inside the given VM.
pub type LibraryFactory = fn(&Lua) -> mlua::Result<Table>;

/// Strategy object mapping short library names to factories.
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    factories: BTreeMap<String, LibraryFactory>,
}

impl LibraryResolver {
    /// Creates a resolver with no libraries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Creates a resolver with `json`, `iutf8` and `utils`.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::empty()
            .with("json", json::create)
            .with("iutf8", iutf8::create)
            .with("utils", utils::create)
    }

    /// Registers (or replaces) a library.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, factory: LibraryFactory) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Returns the factory for `name`.
    #[must_use]
    pub fn factory(&self, name: &str) -> Option<LibraryFactory> {
        self.factories.get(name).copied()
    }

    /// Registered library names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Message the builtin searcher returns for an unknown name.
    #[must_use]
    pub fn not_found_message(name: &str) -> String {
        format!("\n\tno builtin library '{name}'")
    }
}

impl Default for LibraryResolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}
