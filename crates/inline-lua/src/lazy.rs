//! Lazy-load stubs.
//!
//! A module that recorded its commands with `saveLazyLoad()` is not executed
//! at load time. Instead one stub per recorded command is registered with the
//! saved description and category, so listings work right away. The first
//! stub call runs the module once, then forwards to the real command that
//! replaced the stub.

use crate::engine::Engine;
use crate::loader::{execute_module, ModuleSource};
use crate::registry::CommandEntry;
use inline_runtime::LazyRecord;
use mlua::{Lua, MultiValue};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyState {
    Pending,
    /// Execution in progress. Re-entrant stub calls see this and do not run
    /// the module a second time.
    Loading,
    Loaded,
    Failed,
}

/// Once-guard around a deferred module.
pub struct LazyModule {
    source: ModuleSource,
    state: Mutex<LazyState>,
}

impl LazyModule {
    #[must_use]
    pub fn new(source: ModuleSource) -> Self {
        Self {
            source,
            state: Mutex::new(LazyState::Pending),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.source.key
    }

    #[must_use]
    pub fn state(&self) -> LazyState {
        *self.state.lock()
    }

    /// Executes the module if it has not run yet.
    ///
    /// Returns `Ok(true)` when this call executed it. Stubs are removed
    /// before execution so the module's own registrations take their place;
    /// a name the module no longer registers simply disappears.
    pub fn ensure_loaded(&self, lua: &Lua, engine: &Arc<Engine>) -> mlua::Result<bool> {
        {
            let mut state = self.state.lock();
            if *state != LazyState::Pending {
                return Ok(false);
            }
            *state = LazyState::Loading;
        }

        let removed = engine.registries.lock().remove_stubs(&self.source.key);
        tracing::debug!(module = %self.source.key, stubs = removed, "lazy module first load");

        match execute_module(lua, engine, &self.source) {
            Ok(()) => {
                *self.state.lock() = LazyState::Loaded;
                Ok(true)
            }
            Err(e) => {
                *self.state.lock() = LazyState::Failed;
                Err(e)
            }
        }
    }
}

/// Registers one stub per recorded command. Returns the number installed.
pub(crate) fn install_stubs(
    lua: &Lua,
    engine: &Arc<Engine>,
    module: &Arc<LazyModule>,
    record: &LazyRecord,
) -> mlua::Result<usize> {
    let generation = engine.generation();
    let mut installed = 0;

    for (name, meta) in &record.commands {
        let weak: Weak<Engine> = Arc::downgrade(engine);
        let guard = Arc::clone(module);
        let command = name.clone();

        let stub = lua.create_function(move |lua, args: MultiValue| {
            let engine = Engine::upgrade(&weak)?;
            if engine.generation() != generation {
                return Ok(MultiValue::new());
            }
            guard.ensure_loaded(lua, &engine)?;

            let real = engine.registries.lock().loaded_callable(&command);
            match real {
                Some(callable) => callable.call::<MultiValue>(args),
                None => {
                    tracing::debug!(module = %guard.key(), command = %command, "stale lazy command");
                    Ok(MultiValue::new())
                }
            }
        })?;

        engine.registries.lock().insert_command(
            name.clone(),
            CommandEntry {
                callable: stub,
                description: meta.description.clone(),
                category: meta.category.clone(),
                owner: module.key().to_string(),
                stub: true,
            },
        );
        installed += 1;
    }

    tracing::debug!(module = %module.key(), stubs = installed, "installed lazy stubs");
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NoHost;
    use inline_runtime::{CommandMeta, MemoryStore, RecordingNotifier};
    use std::collections::BTreeMap;

    fn engine() -> Arc<Engine> {
        Engine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(NoHost),
        )
    }

    fn record(names: &[&str]) -> LazyRecord {
        LazyRecord {
            commands: names
                .iter()
                .map(|n| {
                    (
                        (*n).to_string(),
                        CommandMeta {
                            description: Some(format!("{n} desc")),
                            category: Some("Lazy".into()),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    const MODULE: &str = r#"
        loads = (loads or 0) + 1
        return function(module)
            module:registerCommand("twice", function(x) return x * 2 end)
        end
    "#;

    fn lazy_module() -> Arc<LazyModule> {
        Arc::new(LazyModule::new(ModuleSource {
            key: "modules/lazy.lua".into(),
            text: MODULE.into(),
            internal: true,
        }))
    }

    #[test]
    fn stubs_carry_saved_metadata() {
        let lua = Lua::new();
        let engine = engine();
        let module = lazy_module();
        let n = install_stubs(&lua, &engine, &module, &record(&["twice", "gone"])).unwrap();
        assert_eq!(n, 2);

        let infos = engine.registries.lock().command_infos();
        assert!(infos.iter().all(|i| i.lazy));
        assert_eq!(infos[1].description.as_deref(), Some("twice desc"));
        assert_eq!(infos[1].category.as_deref(), Some("Lazy"));
        let loads: Option<i64> = lua.globals().get("loads").unwrap();
        assert!(loads.is_none());
    }

    #[test]
    fn first_call_loads_once_and_forwards() {
        let lua = Lua::new();
        let engine = engine();
        let module = lazy_module();
        install_stubs(&lua, &engine, &module, &record(&["twice"])).unwrap();

        let stub = engine.registries.lock().callable("twice").unwrap();
        assert_eq!(stub.call::<i64>(21).unwrap(), 42);
        assert_eq!(stub.call::<i64>(5).unwrap(), 10);

        let loads: i64 = lua.globals().get("loads").unwrap();
        assert_eq!(loads, 1);
        assert_eq!(module.state(), LazyState::Loaded);
        assert!(!engine.registries.lock().command("twice").unwrap().stub);
    }

    #[test]
    fn stub_called_while_its_module_loads_returns_nothing() {
        let lua = Lua::new();
        let engine = engine();
        let module = Arc::new(LazyModule::new(ModuleSource {
            key: "modules/reentrant.lua".into(),
            text: r##"
                loads = (loads or 0) + 1
                nested = select("#", twice_stub(4))
                return function(module)
                    module:registerCommand("twice", function(x) return x * 2 end)
                end
            "##
            .into(),
            internal: true,
        }));
        install_stubs(&lua, &engine, &module, &record(&["twice"])).unwrap();
        let stub = engine.registries.lock().callable("twice").unwrap();
        lua.globals().set("twice_stub", stub.clone()).unwrap();

        assert_eq!(stub.call::<i64>(21).unwrap(), 42);

        let nested: i64 = lua.globals().get("nested").unwrap();
        assert_eq!(nested, 0);
        let loads: i64 = lua.globals().get("loads").unwrap();
        assert_eq!(loads, 1);
        assert_eq!(module.state(), LazyState::Loaded);
    }

    #[test]
    fn stale_name_is_a_noop() {
        let lua = Lua::new();
        let engine = engine();
        let module = lazy_module();
        install_stubs(&lua, &engine, &module, &record(&["twice", "gone"])).unwrap();

        let gone = engine.registries.lock().callable("gone").unwrap();
        let result = gone.call::<MultiValue>(()).unwrap();
        assert!(result.is_empty());
        assert!(engine.registries.lock().command("gone").is_none());
    }

    #[test]
    fn stub_from_older_generation_does_nothing() {
        let lua = Lua::new();
        let engine = engine();
        let module = lazy_module();
        install_stubs(&lua, &engine, &module, &record(&["twice"])).unwrap();
        let stub = engine.registries.lock().callable("twice").unwrap();

        engine.reset();
        assert!(stub.call::<MultiValue>(3).unwrap().is_empty());
        assert_eq!(module.state(), LazyState::Pending);
    }

    #[test]
    fn failed_load_is_not_retried() {
        let lua = Lua::new();
        let engine = engine();
        let module = Arc::new(LazyModule::new(ModuleSource {
            key: "modules/broken.lua".into(),
            text: "error('broken module')".into(),
            internal: true,
        }));
        install_stubs(&lua, &engine, &module, &record(&["b"])).unwrap();
        let stub = engine.registries.lock().callable("b").unwrap();

        assert!(stub.call::<MultiValue>(()).is_err());
        assert_eq!(module.state(), LazyState::Failed);
        assert!(!module.ensure_loaded(&lua, &engine).unwrap());
    }
}
