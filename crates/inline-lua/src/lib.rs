//! Lua script runtime and command dispatcher for inline text commands.
//!
//! Scripts observe and rewrite text typed into editable fields. Typing
//! `{upper hello}$` into a field runs the `upper` command, which replaces the
//! expression with `HELLO`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── ScriptRuntime ─────────────────────────┐
//! │                                                                 │
//! │  create_environment()          on_text_changed(field)           │
//! │        │                               │                        │
//! │        ▼                               ▼                        │
//! │  ┌────────────┐  execute   ┌────────────────────┐              │
//! │  │ModuleLoader│──────────▶ │ Dispatcher          │              │
//! │  │ bundled +  │  or stub   │  watchers → scan →  │              │
//! │  │ external   │            │  finders → Query    │              │
//! │  └─────┬──────┘            └─────────┬──────────┘              │
//! │        │ module:register*()          │ lookup                   │
//! │        ▼                             ▼                          │
//! │  ┌───────────────────── Engine ───────────────────────────┐    │
//! │  │ Registries (commands, watchers, finders, preferences)  │    │
//! │  │ lazy guards · Scheduler · ModuleStore · Notifier · host │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Module
//!
//! ```lua
//! -- ~/.inline/modules/greet.lua
//! local utils = require "utils"
//!
//! return function(module)
//!     module.category = "Fun"
//!     module:registerCommand("greet", utils.hasArgs(function(field, query)
//!         query:answer("Hello, " .. query.args .. "!")
//!     end), "Greet someone")
//! end
//! ```
//!
//! # Hot Reload
//!
//! Calling [`ScriptRuntime::create_environment`] again discards the whole
//! previous generation and loads every module from scratch. Modules that
//! called `module:saveLazyLoad()` come back as stubs and only execute when
//! one of their commands is first used.

mod api;
pub mod dispatcher;
pub mod embedded;
mod engine;
mod error;
pub mod field;
pub mod host;
pub mod lazy;
pub mod libs;
pub mod loader;
mod lua_env;
pub mod module;
pub mod query;
pub mod registry;
mod runtime;
pub mod scheduler;
pub mod testing;

pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::LuaError;
pub use field::FieldHandle;
pub use host::{HostServices, NoHost, RecordingHost};
pub use libs::LibraryResolver;
pub use loader::{BundledModules, LoadFailure, LoadMode, LoadReport, ModuleLoader, ModuleSource};
pub use lua_env::LuaEnv;
pub use query::QueryHandle;
pub use registry::{CommandInfo, PreferenceItem};
pub use runtime::{RuntimeConfig, ScriptRuntime, ScriptRuntimeBuilder};
pub use scheduler::GenerationToken;
