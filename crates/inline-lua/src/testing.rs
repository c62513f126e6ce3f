//! Test harness for script modules.
//!
//! Wires a [`ScriptRuntime`] to in-memory collaborators so tests can load
//! modules from strings, type into a field and inspect what happened.
//!
//! ```
//! use inline_lua::testing::RuntimeHarness;
//!
//! let mut harness = RuntimeHarness::with_modules(&[(
//!     "shout.lua",
//!     r#"return function(module)
//!         module:registerCommand("shout", function(_, q) q:answer(q.args:upper() .. "!") end)
//!     end"#,
//! )])
//! .expect("harness init");
//! harness.load().expect("load");
//!
//! assert_eq!(harness.type_text("{shout hey}$"), "HEY!");
//! ```

use crate::error::LuaError;
use crate::host::RecordingHost;
use crate::loader::{BundledModules, LoadReport};
use crate::runtime::{RuntimeConfig, ScriptRuntime};
use inline_event::{MemoryField, TextField};
use inline_runtime::{MemoryStore, ModuleStore, Notification, RecordingNotifier};
use std::sync::Arc;

pub struct RuntimeHarness {
    pub runtime: ScriptRuntime,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub host: Arc<RecordingHost>,
    field: Arc<MemoryField>,
}

impl RuntimeHarness {
    /// Harness over the given modules only, loaded in slice order.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built.
    pub fn with_modules(modules: &[(&str, &str)]) -> Result<Self, LuaError> {
        let bundled = modules
            .iter()
            .fold(BundledModules::none(), |set, (name, source)| {
                set.with(*name, *source)
            });
        Self::build(RuntimeConfig::default(), bundled, Arc::new(MemoryStore::new()))
    }

    /// Harness with full control over configuration, modules and store.
    ///
    /// Sharing one store between two harnesses simulates a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built.
    pub fn build(
        config: RuntimeConfig,
        bundled: BundledModules,
        store: Arc<MemoryStore>,
    ) -> Result<Self, LuaError> {
        let notifier = Arc::new(RecordingNotifier::new());
        let host = Arc::new(RecordingHost::new());
        let runtime = ScriptRuntime::builder(config)
            .bundled(bundled)
            .store(Arc::clone(&store) as Arc<dyn ModuleStore>)
            .notifier(notifier.clone())
            .host(host.clone())
            .build()?;
        Ok(Self {
            runtime,
            store,
            notifier,
            host,
            field: Arc::new(MemoryField::empty()),
        })
    }

    /// Creates (or recreates) the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the VM cannot be set up.
    pub fn load(&mut self) -> Result<LoadReport, LuaError> {
        self.runtime.create_environment()
    }

    /// Types `text` into the harness field (caret at the end), dispatches,
    /// and returns the resulting text.
    pub fn type_text(&self, text: &str) -> String {
        self.field.type_text(text);
        let field: Arc<dyn TextField> = self.field.clone();
        self.runtime.on_text_changed(&field);
        self.field.text()
    }

    #[must_use]
    pub fn field(&self) -> &Arc<MemoryField> {
        &self.field
    }

    /// Notifications recorded so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifier.snapshot()
    }

    /// Reads a global from the live VM, `None` if absent or no VM exists.
    #[must_use]
    pub fn global<T: mlua::FromLua>(&self, name: &str) -> Option<T> {
        self.runtime
            .lua()
            .and_then(|lua| lua.globals().get::<Option<T>>(name).ok().flatten())
    }
}
