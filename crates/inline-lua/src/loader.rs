//! Module discovery and loading.
//!
//! # Sources
//!
//! ```text
//! bundled   modules/<file>            (read-only, name order)
//! external  <dir>/<file>.lua          (each configured dir, name order,
//!                                      keyed by absolute path)
//! ```
//!
//! Only regular files with a `.lua` extension are modules; anything else in
//! a module directory (notes, data files, subdirectories holding `require`
//! targets) is left alone. A configured directory that is missing or
//! unreadable contributes no modules and is logged; it never stops the
//! bundled modules or the other directories from loading.
//!
//! Exclusions are subtracted from both before anything runs. An entry is
//! excluded when the set names its key, its file name, or a directory
//! containing it.
//!
//! # Strategy
//!
//! | Lazy metadata | Mode | Action |
//! |---------------|------|--------|
//! | none | normal | execute |
//! | recorded | normal | install stubs |
//! | none | force-lazy | skip (already executed) |
//! | recorded | force-lazy | execute through the stub guard |
//!
//! The sequence stops at the first module that fails. Modules loaded before
//! it stay registered; later ones are not loaded in this generation.

use crate::engine::Engine;
use crate::error::LuaError;
use crate::lazy::{install_stubs, LazyModule};
use crate::module::ModuleHandle;
use inline_runtime::NotificationSource;
use mlua::{Lua, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key prefix of bundled modules.
pub const BUNDLED_PREFIX: &str = "modules/";

const BOM: char = '\u{feff}';

/// Text of one module, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub key: String,
    pub text: String,
    /// `true` for bundled modules.
    pub internal: bool,
}

/// The bundled module set.
#[derive(Debug, Clone, Default)]
pub struct BundledModules {
    modules: Vec<(String, String)>,
}

impl BundledModules {
    /// Modules compiled into the crate.
    #[must_use]
    pub fn embedded() -> Self {
        crate::embedded::all()
            .into_iter()
            .fold(Self::none(), |set, (name, source)| set.with(name, source))
    }

    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Adds a module. Modules load in the order they were added.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.modules.push((name.into(), source.into()));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Origin {
    Bundled(String),
    External { path: PathBuf, dir: PathBuf },
}

/// A discovered module, not yet read.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub key: String,
    /// File name, e.g. `text.lua`.
    pub name: String,
    origin: Origin,
}

impl ModuleEntry {
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self.origin, Origin::Bundled(_))
    }

    fn is_excluded(&self, excluded: &BTreeSet<String>) -> bool {
        if excluded.contains(&self.key) || excluded.contains(&self.name) {
            return true;
        }
        match &self.origin {
            Origin::Bundled(_) => false,
            Origin::External { path, dir } => {
                excluded.contains(dir.to_string_lossy().as_ref())
                    || path
                        .ancestors()
                        .skip(1)
                        .any(|a| excluded.contains(a.to_string_lossy().as_ref()))
            }
        }
    }

    /// Reads the module text, stripping a leading byte-order mark.
    pub fn read(&self) -> Result<ModuleSource, LuaError> {
        let text = match &self.origin {
            Origin::Bundled(text) => text.clone(),
            Origin::External { path, .. } => {
                let bytes = std::fs::read(path).map_err(|e| LuaError::io(path, e))?;
                String::from_utf8(bytes).map_err(|_| {
                    LuaError::InvalidScript(format!("{}: not valid UTF-8", path.display()))
                })?
            }
        };
        Ok(ModuleSource {
            key: self.key.clone(),
            text: strip_bom(text),
            internal: self.is_internal(),
        })
    }
}

/// Drops a leading UTF-8 byte-order mark.
pub(crate) fn strip_bom(text: String) -> String {
    if text.starts_with(BOM) {
        text[BOM.len_utf8()..].to_string()
    } else {
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    #[default]
    Normal,
    /// Execute every module that has lazy metadata; skip the rest.
    ForceLazy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub key: String,
    pub message: String,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Outcome of one load sequence. Lists hold module keys in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub executed: Vec<String>,
    pub stubbed: Vec<String>,
    pub excluded: Vec<String>,
    pub skipped: Vec<String>,
    /// The module that stopped the sequence.
    pub failure: Option<LoadFailure>,
}

impl LoadReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    /// Modules executed or stubbed.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.executed.len() + self.stubbed.len()
    }
}

/// Discovers modules and runs the load sequence.
#[derive(Debug, Clone, Default)]
pub struct ModuleLoader {
    bundled: BundledModules,
    dirs: Vec<PathBuf>,
    excluded: BTreeSet<String>,
}

impl ModuleLoader {
    #[must_use]
    pub fn new(bundled: BundledModules) -> Self {
        Self {
            bundled,
            dirs: Vec::new(),
            excluded: BTreeSet::new(),
        }
    }

    /// Adds external module directories, scanned in the given order.
    #[must_use]
    pub fn with_dirs(mut self, dirs: impl IntoIterator<Item = impl AsRef<Path>>) -> Self {
        self.dirs
            .extend(dirs.into_iter().map(|d| d.as_ref().to_path_buf()));
        self
    }

    #[must_use]
    pub fn with_excluded(mut self, excluded: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded.extend(excluded.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Lists every module in load order, exclusions included.
    ///
    /// Directories that cannot be read are skipped with a warning.
    #[must_use]
    pub fn entries(&self) -> Vec<ModuleEntry> {
        let mut entries: Vec<ModuleEntry> = self
            .bundled
            .modules
            .iter()
            .map(|(name, text)| ModuleEntry {
                key: format!("{BUNDLED_PREFIX}{name}"),
                name: name.clone(),
                origin: Origin::Bundled(text.clone()),
            })
            .collect();

        for dir in &self.dirs {
            let files = match list_modules(dir) {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "skipping module directory");
                    continue;
                }
            };

            for path in files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                entries.push(ModuleEntry {
                    key: path.to_string_lossy().into_owned(),
                    name,
                    origin: Origin::External {
                        path,
                        dir: dir.clone(),
                    },
                });
            }
        }
        entries
    }

    /// Runs the load sequence. Never fails: the first error is recorded in
    /// the report and sent to the notifier, and loading stops there.
    pub fn load(&self, lua: &Lua, engine: &Arc<Engine>, mode: LoadMode) -> LoadReport {
        let mut report = LoadReport::default();

        for entry in self.entries() {
            if entry.is_excluded(&self.excluded) {
                tracing::debug!(module = %entry.key, "module excluded");
                report.excluded.push(entry.key);
                continue;
            }
            if let Err(e) = load_entry(lua, engine, &entry, mode, &mut report) {
                abort(engine, &mut report, &entry.key, &e);
                break;
            }
        }

        tracing::debug!(
            ?mode,
            executed = report.executed.len(),
            stubbed = report.stubbed.len(),
            excluded = report.excluded.len(),
            skipped = report.skipped.len(),
            ok = report.is_ok(),
            "load sequence finished"
        );
        report
    }
}

/// `.lua` files directly inside `dir`, sorted, as canonical paths.
fn list_modules(dir: &Path) -> Result<Vec<PathBuf>, LuaError> {
    let base = std::fs::canonicalize(dir).map_err(|e| LuaError::io(dir, e))?;
    let mut files: Vec<PathBuf> = std::fs::read_dir(&base)
        .map_err(|e| LuaError::io(&base, e))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "lua"))
        .collect();
    files.sort();
    Ok(files)
}

fn abort(engine: &Engine, report: &mut LoadReport, key: &str, error: &LuaError) {
    tracing::warn!(module = %key, error = %error, "module load failed, stopping load sequence");
    engine.notify(NotificationSource::Load, key, error);
    report.failure = Some(LoadFailure {
        key: key.to_string(),
        message: error.to_string(),
    });
}

fn load_entry(
    lua: &Lua,
    engine: &Arc<Engine>,
    entry: &ModuleEntry,
    mode: LoadMode,
    report: &mut LoadReport,
) -> Result<(), LuaError> {
    let record = engine.store.lazy(&entry.key).filter(|r| !r.is_empty());

    match (mode, record) {
        (LoadMode::Normal, None) => {
            let source = entry.read()?;
            execute_module(lua, engine, &source)?;
            report.executed.push(entry.key.clone());
        }
        (LoadMode::Normal, Some(record)) => {
            let module = Arc::new(LazyModule::new(entry.read()?));
            install_stubs(lua, engine, &module, &record)?;
            engine.lazy.lock().insert(entry.key.clone(), module);
            report.stubbed.push(entry.key.clone());
        }
        (LoadMode::ForceLazy, None) => {
            report.skipped.push(entry.key.clone());
        }
        (LoadMode::ForceLazy, Some(_)) => {
            // Without a guard the module was executed eagerly this generation.
            let guard = engine.lazy.lock().get(&entry.key).cloned();
            let ran = match guard {
                Some(guard) => guard.ensure_loaded(lua, engine)?,
                None => false,
            };
            if ran {
                report.executed.push(entry.key.clone());
            } else {
                report.skipped.push(entry.key.clone());
            }
        }
    }
    Ok(())
}

/// Compiles and runs one module. If the chunk returns a function, it is
/// called with a fresh [`ModuleHandle`].
pub(crate) fn execute_module(
    lua: &Lua,
    engine: &Arc<Engine>,
    source: &ModuleSource,
) -> mlua::Result<()> {
    let value: Value = lua
        .load(source.text.as_str())
        .set_name(format!("@{}", source.key))
        .eval()?;

    if let Value::Function(init) = value {
        let handle = ModuleHandle::new(source.key.clone(), source.internal, Arc::downgrade(engine));
        init.call::<()>(handle)?;
    }
    tracing::debug!(module = %source.key, "module executed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NoHost;
    use inline_runtime::{CommandMeta, LazyRecord, MemoryStore, ModuleStore, RecordingNotifier};
    use std::fs;

    fn engine_with(store: Arc<MemoryStore>, notifier: Arc<RecordingNotifier>) -> Arc<Engine> {
        Engine::new(store, notifier, Arc::new(NoHost))
    }

    fn command_module(name: &str) -> String {
        format!(
            r#"return function(module)
                module:registerCommand("{name}", function(_, q) q:answer("{name}") end)
            end"#
        )
    }

    #[test]
    fn bundled_before_external_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.lua"), "").unwrap();
        fs::write(dir.path().join("a.lua"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let loader = ModuleLoader::new(BundledModules::none().with("z.lua", ""))
            .with_dirs([dir.path()]);
        let entries = loader.entries();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["z.lua", "a.lua", "b.lua"]);

        assert_eq!(entries[0].key, "modules/z.lua");
        assert!(entries[0].is_internal());
        assert!(Path::new(&entries[1].key).is_absolute());
        assert!(!entries[1].is_internal());
    }

    #[test]
    fn byte_order_mark_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bom.lua"), "\u{feff}return 1").unwrap();
        let loader = ModuleLoader::default().with_dirs([dir.path()]);
        let source = loader.entries()[0].read().unwrap();
        assert_eq!(source.text, "return 1");
    }

    #[test]
    fn exclusion_by_key_name_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(dir.path().join("a.lua"), "").unwrap();
        fs::write(sub.join("b.lua"), "").unwrap();

        let loader = ModuleLoader::new(BundledModules::none().with("x.lua", "").with("y.lua", ""))
            .with_dirs([dir.path(), sub.as_path()]);
        let entries = loader.entries();

        let by_name = BTreeSet::from(["x.lua".to_string()]);
        assert!(entries[0].is_excluded(&by_name));
        assert!(!entries[1].is_excluded(&by_name));

        let by_key = BTreeSet::from(["modules/y.lua".to_string()]);
        assert!(entries[1].is_excluded(&by_key));

        let by_dir = BTreeSet::from([sub.to_string_lossy().into_owned()]);
        let b = entries.iter().find(|e| e.name == "b.lua").unwrap();
        let a = entries.iter().find(|e| e.name == "a.lua").unwrap();
        assert!(b.is_excluded(&by_dir));
        assert!(!a.is_excluded(&by_dir));
    }

    #[test]
    fn load_executes_and_reports() {
        let lua = Lua::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine_with(Arc::new(MemoryStore::new()), notifier.clone());
        let loader = ModuleLoader::new(
            BundledModules::none()
                .with("a.lua", command_module("a"))
                .with("b.lua", command_module("b")),
        )
        .with_excluded(["b.lua"]);

        let report = loader.load(&lua, &engine, LoadMode::Normal);
        assert!(report.is_ok());
        assert_eq!(report.executed, vec!["modules/a.lua"]);
        assert_eq!(report.excluded, vec!["modules/b.lua"]);
        assert!(engine.registries.lock().command("a").is_some());
        assert!(notifier.is_empty());
    }

    #[test]
    fn first_failure_stops_the_sequence() {
        let lua = Lua::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine_with(Arc::new(MemoryStore::new()), notifier.clone());
        let loader = ModuleLoader::new(
            BundledModules::none()
                .with("1.lua", command_module("one"))
                .with("2.lua", "return function() error('boom') end")
                .with("3.lua", command_module("three")),
        );

        let report = loader.load(&lua, &engine, LoadMode::Normal);
        let failure = report.failure.unwrap();
        assert_eq!(failure.key, "modules/2.lua");
        assert!(failure.message.contains("boom"));
        assert_eq!(report.executed, vec!["modules/1.lua"]);

        let registries = engine.registries.lock();
        assert!(registries.command("one").is_some());
        assert!(registries.command("three").is_none());

        let seen = notifier.snapshot();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].source, NotificationSource::Load);
    }

    #[test]
    fn recorded_metadata_installs_stubs_and_force_lazy_runs_them() {
        let lua = Lua::new();
        let store = Arc::new(MemoryStore::new());
        store
            .save_lazy(
                "modules/lazy.lua",
                LazyRecord {
                    commands: [("lz".to_string(), CommandMeta::default())].into(),
                },
            )
            .unwrap();
        let engine = engine_with(store, Arc::new(RecordingNotifier::new()));
        let loader = ModuleLoader::new(
            BundledModules::none()
                .with("eager.lua", command_module("eg"))
                .with("lazy.lua", command_module("lz")),
        );

        let report = loader.load(&lua, &engine, LoadMode::Normal);
        assert_eq!(report.executed, vec!["modules/eager.lua"]);
        assert_eq!(report.stubbed, vec!["modules/lazy.lua"]);
        assert!(engine.registries.lock().command("lz").unwrap().stub);

        let report = loader.load(&lua, &engine, LoadMode::ForceLazy);
        assert_eq!(report.executed, vec!["modules/lazy.lua"]);
        assert_eq!(report.skipped, vec!["modules/eager.lua"]);
        assert!(!engine.registries.lock().command("lz").unwrap().stub);

        // Already loaded: nothing left to force.
        let report = loader.load(&lua, &engine, LoadMode::ForceLazy);
        assert!(report.executed.is_empty());
    }

    #[test]
    fn chunk_name_is_module_key() {
        let lua = Lua::new();
        let engine = engine_with(Arc::new(MemoryStore::new()), Arc::new(RecordingNotifier::new()));
        let source = ModuleSource {
            key: "modules/bad.lua".into(),
            text: "error('here')".into(),
            internal: true,
        };
        let err = execute_module(&lua, &engine, &source).unwrap_err();
        assert!(err.to_string().contains("modules/bad.lua:1"));
    }

    #[test]
    fn missing_directory_is_skipped() {
        let lua = Lua::new();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ext.lua"), command_module("ext")).unwrap();
        let engine = engine_with(Arc::new(MemoryStore::new()), Arc::new(RecordingNotifier::new()));
        let loader = ModuleLoader::new(BundledModules::none().with("a.lua", command_module("a")))
            .with_dirs([Path::new("/definitely/not/here"), dir.path()]);

        let report = loader.load(&lua, &engine, LoadMode::Normal);
        assert!(report.is_ok(), "{report:?}");
        assert_eq!(report.executed.len(), 2);
        assert_eq!(report.executed[0], "modules/a.lua");
        assert!(report.executed[1].ends_with("ext.lua"));
    }
}
