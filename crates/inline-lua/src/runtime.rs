//! Script runtime: one live environment generation at a time.
//!
//! ```ignore
//! use inline_lua::{RuntimeConfig, ScriptRuntime};
//!
//! let mut runtime = ScriptRuntime::builder(RuntimeConfig::default()).build()?;
//! let report = runtime.create_environment()?;      // also used to reload
//! runtime.on_text_changed(&field);                   // host text signal
//! runtime.run_due_timers();                          // host timer pump
//! ```
//!
//! `create_environment` tears the previous generation down completely before
//! building the next one: registries, lazy guards, pending timers, overlay
//! windows and the VM itself. Nothing carries over except the module store.

use crate::api;
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::engine::Engine;
use crate::error::LuaError;
use crate::host::{HostServices, NoHost};
use crate::libs::LibraryResolver;
use crate::loader::{BundledModules, LoadMode, LoadReport, ModuleLoader};
use crate::lua_env::LuaEnv;
use crate::registry::{CommandInfo, PreferenceItem};
use crate::scheduler::GenerationToken;
use inline_event::TextField;
use inline_runtime::config::DEFAULT_PATTERN;
use inline_runtime::{
    InlineConfig, MemoryStore, ModuleStore, NotificationSource, Notifier, TracingNotifier,
};
use mlua::Lua;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Runtime settings derived from [`InlineConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub pattern: String,
    /// Load bundled modules.
    pub bundled: bool,
    /// External module directories, in load order.
    pub dirs: Vec<PathBuf>,
    pub excluded: BTreeSet<String>,
    /// Deliver selection-change signals to watchers.
    pub selection_events: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            bundled: true,
            dirs: Vec::new(),
            excluded: BTreeSet::new(),
            selection_events: false,
        }
    }
}

impl RuntimeConfig {
    /// Resolves module directories against `project_root` and keeps only the
    /// ones that exist.
    #[must_use]
    pub fn from_config(config: &InlineConfig, project_root: Option<&Path>) -> Self {
        Self {
            pattern: config.trigger.pattern.clone(),
            bundled: config.scripts.bundled,
            dirs: config.scripts.resolve_dirs(project_root),
            excluded: config.scripts.excluded.clone(),
            selection_events: config.trigger.selection_events,
        }
    }
}

/// Builder for [`ScriptRuntime`].
pub struct ScriptRuntimeBuilder {
    config: RuntimeConfig,
    store: Arc<dyn ModuleStore>,
    notifier: Arc<dyn Notifier>,
    host: Arc<dyn HostServices>,
    bundled: BundledModules,
    resolver: LibraryResolver,
}

impl ScriptRuntimeBuilder {
    /// Where lazy-load metadata and descriptions persist. Defaults to an
    /// in-memory store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn ModuleStore>) -> Self {
        self.store = store;
        self
    }

    /// Receives non-fatal failures. Defaults to [`TracingNotifier`].
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn host(mut self, host: Arc<dyn HostServices>) -> Self {
        self.host = host;
        self
    }

    /// Replaces the embedded module set.
    #[must_use]
    pub fn bundled(mut self, bundled: BundledModules) -> Self {
        self.bundled = bundled;
        self
    }

    #[must_use]
    pub fn libraries(mut self, resolver: LibraryResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Builds the runtime. No environment exists until
    /// [`ScriptRuntime::create_environment`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`LuaError::Pattern`] if the trigger pattern does not compile.
    pub fn build(self) -> Result<ScriptRuntime, LuaError> {
        let dispatcher = Dispatcher::new(&self.config.pattern)?;
        let bundled = if self.config.bundled {
            self.bundled
        } else {
            BundledModules::none()
        };
        let loader = ModuleLoader::new(bundled)
            .with_dirs(&self.config.dirs)
            .with_excluded(self.config.excluded.iter().cloned());
        let env = LuaEnv::new()
            .with_search_paths(&self.config.dirs)
            .with_resolver(self.resolver);

        Ok(ScriptRuntime {
            engine: Engine::new(self.store, self.notifier, self.host),
            dispatcher,
            loader,
            env,
            selection_events: self.config.selection_events,
            lua: None,
        })
    }
}

pub struct ScriptRuntime {
    engine: Arc<Engine>,
    dispatcher: Dispatcher,
    loader: ModuleLoader,
    env: LuaEnv,
    selection_events: bool,
    lua: Option<Lua>,
}

impl ScriptRuntime {
    #[must_use]
    pub fn builder(config: RuntimeConfig) -> ScriptRuntimeBuilder {
        ScriptRuntimeBuilder {
            config,
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(TracingNotifier),
            host: Arc::new(NoHost),
            bundled: BundledModules::embedded(),
            resolver: LibraryResolver::with_defaults(),
        }
    }

    /// Builds a fresh environment generation and loads every module.
    ///
    /// Module failures do not make this fail: the load sequence stops at the
    /// first failing module, reports it to the notifier, and the returned
    /// report names it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the VM itself cannot be set up.
    pub fn create_environment(&mut self) -> Result<LoadReport, LuaError> {
        let generation = self.engine.reset();
        self.engine.host.close_overlays();
        self.lua = None;
        self.dispatcher.reset();

        let lua = self.env.create_lua()?;
        api::install(&lua, &self.engine)?;
        let report = self.loader.load(&lua, &self.engine, LoadMode::Normal);
        self.lua = Some(lua);

        tracing::info!(
            generation,
            executed = report.executed.len(),
            stubbed = report.stubbed.len(),
            excluded = report.excluded.len(),
            ok = report.is_ok(),
            "script environment created"
        );
        Ok(report)
    }

    /// Executes every module that is still represented by lazy stubs.
    ///
    /// # Errors
    ///
    /// Returns an error only if no environment existed and creating one
    /// failed.
    pub fn force_load_lazy(&mut self) -> Result<LoadReport, LuaError> {
        if self.lua.is_none() {
            self.create_environment()?;
        }
        let Some(lua) = self.lua.as_ref() else {
            return Ok(LoadReport::default());
        };
        Ok(self.loader.load(lua, &self.engine, LoadMode::ForceLazy))
    }

    /// Host text-change signal. A no-op before the first environment.
    pub fn on_text_changed(&self, field: &Arc<dyn TextField>) -> DispatchReport {
        if self.lua.is_none() {
            return DispatchReport::default();
        }
        self.dispatcher.on_text_changed(&self.engine, field)
    }

    /// Host selection-change signal. Ignored unless selection events are
    /// enabled.
    pub fn on_selection_changed(&self, field: &Arc<dyn TextField>) -> DispatchReport {
        if self.lua.is_none() || !self.selection_events {
            return DispatchReport::default();
        }
        self.dispatcher.on_selection_changed(&self.engine, field)
    }

    /// Runs the timers due now. Returns how many ran.
    pub fn run_due_timers(&self) -> usize {
        self.run_due_timers_at(Instant::now())
    }

    pub fn run_due_timers_at(&self, now: Instant) -> usize {
        if self.lua.is_none() {
            return 0;
        }
        let generation = self.engine.generation();
        let mut ran = 0;
        for task in self.engine.scheduler.take_due(now) {
            if task.generation != generation {
                tracing::debug!(task = task.id, "dropping task from an earlier generation");
                continue;
            }
            if let Err(e) = task.callable.call::<()>(()) {
                self.engine
                    .notify(NotificationSource::Timer, &format!("timer#{}", task.id), e);
            }
            ran += 1;
        }
        ran
    }

    /// When the next timer is due, if any is pending.
    #[must_use]
    pub fn next_timer_due(&self) -> Option<Instant> {
        self.engine.scheduler.next_due()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.engine.scheduler.pending()
    }

    /// Registered commands sorted by name, stubs included.
    #[must_use]
    pub fn commands(&self) -> Vec<CommandInfo> {
        self.engine.registries.lock().command_infos()
    }

    /// Preference groups keyed by category, for the host's settings UI.
    #[must_use]
    pub fn preferences(&self) -> BTreeMap<String, Vec<PreferenceItem>> {
        self.engine.registries.lock().preferences().clone()
    }

    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.engine.registries.lock().watcher_count()
    }

    #[must_use]
    pub fn finder_count(&self) -> usize {
        self.engine.registries.lock().finder_count()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.engine.generation()
    }

    /// Token a host keeps across async work to detect a reload in between.
    #[must_use]
    pub fn generation_token(&self) -> GenerationToken {
        self.engine.scheduler.token()
    }

    /// The live VM, if an environment exists.
    #[must_use]
    pub fn lua(&self) -> Option<&Lua> {
        self.lua.as_ref()
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.dispatcher.pattern()
    }

    /// External module directories.
    #[must_use]
    pub fn module_dirs(&self) -> &[PathBuf] {
        self.loader.dirs()
    }
}

impl Drop for ScriptRuntime {
    fn drop(&mut self) {
        // Registry entries hold Lua values; release them before the VM.
        self.engine.reset();
        self.lua = None;
    }
}

impl std::fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("pattern", &self.dispatcher.pattern())
            .field("generation", &self.engine.generation())
            .field("loaded", &self.lua.is_some())
            .finish_non_exhaustive()
    }
}
