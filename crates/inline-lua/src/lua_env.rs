//! Sandboxed Lua VM setup.
//!
//! Every environment generation gets a fresh VM from [`LuaEnv::create_lua`]:
//!
//! - `io`, `debug`, `dofile`, `loadfile` are removed; `os` keeps only
//!   `clock`, `date`, `difftime`, `time`
//! - `package.path` / `package.cpath` are empty and `package.loadlib` is gone
//! - `package.searchers` is replaced
//!
//! # Search Order for `require()`
//!
//! ```text
//! require("lib.helper")
//!   1. package.preload["lib.helper"]
//!   2. Builtin:    LibraryResolver factory named "lib.helper"
//!   3. Filesystem: {module_dir}/lib/helper.lua       (must stay inside dir)
//!                  {module_dir}/lib/helper/init.lua
//!   → "module 'lib.helper' not found:" plus one line per searcher
//! ```
//!
//! Searchers report misses as strings, the way Lua's own searchers do, so a
//! failed `require` is an ordinary script error.

use crate::error::LuaError;
use crate::libs::LibraryResolver;
use crate::loader::strip_bom;
use mlua::{IntoLuaMulti, Lua, MultiValue, Table, Value};
use std::path::{Path, PathBuf};

const OS_KEEP: [&str; 4] = ["clock", "date", "difftime", "time"];

/// Builder for sandboxed VMs.
#[derive(Debug, Clone, Default)]
pub struct LuaEnv {
    search_paths: Vec<PathBuf>,
    resolver: LibraryResolver,
}

impl LuaEnv {
    /// Creates an environment with the default libraries and no search paths.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory for filesystem `require()` resolution.
    #[must_use]
    pub fn with_search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn with_search_paths(mut self, paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Self {
        for p in paths {
            self.search_paths.push(p.as_ref().to_path_buf());
        }
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: LibraryResolver) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Creates a new sandboxed VM.
    ///
    /// # Errors
    ///
    /// Returns [`LuaError::InvalidScript`] if the VM cannot be set up.
    pub fn create_lua(&self) -> Result<Lua, LuaError> {
        let lua = Lua::new();
        sandbox_globals(&lua)?;
        self.setup_searchers(&lua)?;
        Ok(lua)
    }

    fn setup_searchers(&self, lua: &Lua) -> Result<(), LuaError> {
        let package: Table = lua
            .globals()
            .get("package")
            .map_err(|e| LuaError::InvalidScript(format!("package table missing: {e}")))?;

        package
            .set("path", "")
            .map_err(|e| LuaError::InvalidScript(format!("set package.path: {e}")))?;
        package
            .set("cpath", "")
            .map_err(|e| LuaError::InvalidScript(format!("set package.cpath: {e}")))?;
        package
            .set("loadlib", Value::Nil)
            .map_err(|e| LuaError::InvalidScript(format!("clear package.loadlib: {e}")))?;

        // Keep the stock preload searcher, drop the path-based ones.
        let stock: Table = package
            .get("searchers")
            .map_err(|e| LuaError::InvalidScript(format!("package.searchers missing: {e}")))?;
        let preload: Value = stock
            .get(1)
            .map_err(|e| LuaError::InvalidScript(format!("preload searcher missing: {e}")))?;

        let resolver = self.resolver.clone();
        let builtin = lua.create_function(move |lua, name: String| -> mlua::Result<MultiValue> {
            let Some(factory) = resolver.factory(&name) else {
                return LibraryResolver::not_found_message(&name).into_lua_multi(lua);
            };
            let loader = lua.create_function(move |lua, _: MultiValue| factory(lua))?;
            (loader, format!(":builtin:{name}")).into_lua_multi(lua)
        })?;

        let search_paths = self.search_paths.clone();
        let filesystem =
            lua.create_function(move |lua, name: String| -> mlua::Result<MultiValue> {
                let module_rel = name.replace('.', "/");
                let mut misses = String::new();

                for base in &search_paths {
                    let candidates = [
                        base.join(format!("{module_rel}.lua")),
                        base.join(&module_rel).join("init.lua"),
                    ];
                    for path in candidates {
                        if let Some(source) = try_read_within_base(&path, base) {
                            let chunk = lua
                                .load(source)
                                .set_name(format!("@{}", path.display()))
                                .into_function()?;
                            return (chunk, path.display().to_string()).into_lua_multi(lua);
                        }
                        misses.push_str(&format!("\n\tno file '{}'", path.display()));
                    }
                }
                misses.into_lua_multi(lua)
            })?;

        let searchers = lua.create_sequence_from([
            preload,
            Value::Function(builtin),
            Value::Function(filesystem),
        ])?;
        package
            .set("searchers", searchers)
            .map_err(|e| LuaError::InvalidScript(format!("set package.searchers: {e}")))?;
        Ok(())
    }
}

/// Removes globals that reach outside the sandbox.
fn sandbox_globals(lua: &Lua) -> Result<(), LuaError> {
    let globals = lua.globals();
    for name in ["io", "debug", "dofile", "loadfile"] {
        globals
            .set(name, Value::Nil)
            .map_err(|e| LuaError::InvalidScript(format!("remove {name}: {e}")))?;
    }

    let os: Option<Table> = globals
        .get("os")
        .map_err(|e| LuaError::InvalidScript(format!("read os: {e}")))?;
    if let Some(os) = os {
        let safe = lua.create_table()?;
        for name in OS_KEEP {
            safe.set(name, os.get::<Value>(name)?)?;
        }
        globals.set("os", safe)?;
    }
    Ok(())
}

/// Reads `path` if it exists and resolves inside `base`.
///
/// Both sides are canonicalized so `..` and symlinks cannot escape.
fn try_read_within_base(path: &Path, base: &Path) -> Option<String> {
    let canonical = path.canonicalize().ok()?;
    let base_canonical = base.canonicalize().ok()?;
    if !canonical.starts_with(&base_canonical) || !canonical.is_file() {
        return None;
    }
    std::fs::read_to_string(&canonical).ok().map(strip_bom)
}
