//! The `module` object handed to each script.
//!
//! A script returns a function; the loader calls it with a fresh handle:
//!
//! ```lua
//! return function(module)
//!     module.category = "Text"
//!     module:registerCommand("upper", function(field, query)
//!         query:answer(query.args:upper())
//!     end, "Convert to upper case")
//!     module:saveLazyLoad()
//! end
//! ```
//!
//! Registration methods are the only way scripts touch shared state. Every
//! entry they create is tagged with the module key so `unload()` can remove
//! exactly this module's entries.

use crate::engine::Engine;
use crate::error::lua_type_name;
use crate::registry::{CommandEntry, PreferenceItem};
use inline_event::EventMask;
use inline_runtime::{CommandMeta, LazyRecord};
use mlua::{Function, MultiValue, UserData, UserDataFields, UserDataMethods, Value};
use std::sync::{Arc, Weak};

/// Registration facade scoped to one loaded script.
pub struct ModuleHandle {
    key: String,
    internal: bool,
    category: Option<String>,
    engine: Weak<Engine>,
}

impl ModuleHandle {
    pub(crate) fn new(key: impl Into<String>, internal: bool, engine: Weak<Engine>) -> Self {
        Self {
            key: key.into(),
            internal,
            category: None,
            engine,
        }
    }

    fn engine(&self) -> mlua::Result<Arc<Engine>> {
        Engine::upgrade(&self.engine)
    }

    /// Persists the names and metadata of this module's commands so the next
    /// environment can install stubs instead of executing the script.
    fn save_lazy_load(&self) -> mlua::Result<usize> {
        let engine = self.engine()?;
        let record = {
            let registries = engine.registries.lock();
            let commands = registries
                .owned_commands(&self.key)
                .into_iter()
                .filter_map(|name| {
                    let entry = registries.command(&name)?;
                    Some((
                        name,
                        CommandMeta {
                            description: entry.description.clone(),
                            category: entry.category.clone(),
                        },
                    ))
                })
                .collect();
            LazyRecord { commands }
        };
        let count = record.commands.len();
        engine
            .store
            .save_lazy(&self.key, record)
            .map_err(mlua::Error::external)?;
        tracing::debug!(module = %self.key, commands = count, "saved lazy-load metadata");
        Ok(count)
    }
}

fn expect_function(value: Value, pos: usize, method: &str) -> mlua::Result<Function> {
    match value {
        Value::Function(f) => Ok(f),
        other => Err(mlua::Error::RuntimeError(format!(
            "bad argument #{pos} to '{method}' (function expected, got {})",
            lua_type_name(&other)
        ))),
    }
}

impl UserData for ModuleHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("filepath", |_, this| Ok(this.key.clone()));
        fields.add_field_method_get("isInternal", |_, this| Ok(this.internal));
        fields.add_field_method_get("category", |_, this| Ok(this.category.clone()));
        fields.add_field_method_set("category", |_, this, category: Option<String>| {
            this.category = category;
            Ok(())
        });
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method(
            "registerCommand",
            |_, this, (name, callable, description): (String, Value, Option<String>)| {
                let callable = expect_function(callable, 2, "registerCommand")?;
                let engine = this.engine()?;
                engine.registries.lock().insert_command(
                    name.clone(),
                    CommandEntry {
                        callable,
                        description,
                        category: this.category.clone(),
                        owner: this.key.clone(),
                        stub: false,
                    },
                );
                tracing::trace!(module = %this.key, command = %name, "registered command");
                Ok(())
            },
        );

        methods.add_method("unregisterCommand", |_, this, name: String| {
            let engine = this.engine()?;
            let removed = engine.registries.lock().remove_command(&name).is_some();
            Ok(removed)
        });

        methods.add_method(
            "registerWatcher",
            |_, this, (callable, mask): (Value, Option<u32>)| {
                let callable = expect_function(callable, 1, "registerWatcher")?;
                let mask = mask.map_or(EventMask::TEXT_CHANGED, EventMask);
                let engine = this.engine()?;
                engine
                    .registries
                    .lock()
                    .upsert_watcher(callable, mask, &this.key);
                Ok(())
            },
        );

        methods.add_method("unregisterWatcher", |_, this, callable: Function| {
            let engine = this.engine()?;
            let removed = engine.registries.lock().remove_watcher(&callable);
            Ok(removed)
        });

        methods.add_method("registerCommandFinder", |_, this, callable: Value| {
            let callable = expect_function(callable, 1, "registerCommandFinder")?;
            let engine = this.engine()?;
            let added = engine.registries.lock().add_finder(callable, &this.key);
            Ok(added)
        });

        methods.add_method("unregisterCommandFinder", |_, this, callable: Function| {
            let engine = this.engine()?;
            let removed = engine.registries.lock().remove_finder(&callable);
            Ok(removed)
        });

        // module:registerPreferences([scope,] builder)
        methods.add_method("registerPreferences", |_, this, args: MultiValue| {
            let mut args = args.into_iter();
            let (scope, builder) = match (args.next(), args.next()) {
                (Some(Value::Function(builder)), _) => (None, builder),
                (Some(Value::String(scope)), Some(builder)) => (
                    Some(scope.to_string_lossy()),
                    expect_function(builder, 2, "registerPreferences")?,
                ),
                (Some(Value::Nil), Some(builder)) => {
                    (None, expect_function(builder, 2, "registerPreferences")?)
                }
                (first, _) => {
                    return Err(mlua::Error::RuntimeError(format!(
                        "bad argument #1 to 'registerPreferences' (function expected, got {})",
                        first.as_ref().map_or("no value", lua_type_name)
                    )))
                }
            };
            let category = this.category.clone().unwrap_or_else(|| this.key.clone());
            let engine = this.engine()?;
            engine.registries.lock().add_preference(
                category,
                PreferenceItem {
                    scope,
                    builder,
                    owner: this.key.clone(),
                },
            );
            Ok(())
        });

        methods.add_method("unload", |_, this, ()| {
            let engine = this.engine()?;
            let summary = engine.registries.lock().remove_owned(&this.key);
            tracing::debug!(
                module = %this.key,
                commands = summary.commands,
                watchers = summary.watchers,
                finders = summary.finders,
                preferences = summary.preferences,
                "module unloaded"
            );
            Ok(summary.total())
        });

        methods.add_method("saveLazyLoad", |_, this, ()| this.save_lazy_load());

        methods.add_method("setDescription", |_, this, description: Option<String>| {
            if !this.internal {
                return Err(mlua::Error::RuntimeError(
                    "setDescription works only with internal modules".into(),
                ));
            }
            let engine = this.engine()?;
            engine
                .store
                .set_description(&this.key, description)
                .map_err(mlua::Error::external)
        });

        methods.add_meta_method(mlua::MetaMethod::ToString, |_, this, ()| {
            Ok(format!("module({})", this.key))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NoHost;
    use inline_event::EventType;
    use inline_runtime::{MemoryStore, ModuleStore, RecordingNotifier};
    use mlua::Lua;

    fn setup(internal: bool) -> (Lua, Arc<Engine>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(
            store.clone(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(NoHost),
        );
        let lua = Lua::new();
        let handle = ModuleHandle::new("modules/test.lua", internal, Arc::downgrade(&engine));
        lua.globals().set("module", handle).unwrap();
        (lua, engine, store)
    }

    #[test]
    fn register_command_uses_module_category() {
        let (lua, engine, _store) = setup(true);
        lua.load(
            r#"
            module.category = "Text"
            module:registerCommand("up", function() end, "Upper")
            "#,
        )
        .exec()
        .unwrap();

        let registries = engine.registries.lock();
        let entry = registries.command("up").unwrap();
        assert_eq!(entry.category.as_deref(), Some("Text"));
        assert_eq!(entry.description.as_deref(), Some("Upper"));
        assert_eq!(entry.owner, "modules/test.lua");
    }

    #[test]
    fn register_command_requires_function() {
        let (lua, _engine, _store) = setup(true);
        let err = lua
            .load(r#"module:registerCommand("x", 42)"#)
            .exec()
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("bad argument #2 to 'registerCommand' (function expected, got number)"));
    }

    #[test]
    fn watcher_default_mask_is_text_changed() {
        let (lua, engine, _store) = setup(true);
        lua.load("module:registerWatcher(function() end)")
            .exec()
            .unwrap();
        let registries = engine.registries.lock();
        assert_eq!(registries.watchers_for(EventType::TextChanged).len(), 1);
        assert_eq!(registries.watchers_for(EventType::SelectionChanged).len(), 0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let (lua, engine, _store) = setup(true);
        let results: (bool, bool, bool) = lua
            .load(
                r#"
                local f = function() end
                module:registerCommandFinder(f)
                return module:unregisterCommandFinder(f),
                       module:unregisterCommandFinder(f),
                       module:unregisterCommand("never-registered")
                "#,
            )
            .eval()
            .unwrap();
        assert_eq!(results, (true, false, false));
        assert_eq!(engine.registries.lock().finder_count(), 0);
    }

    #[test]
    fn preferences_scope_is_optional() {
        let (lua, engine, _store) = setup(true);
        lua.load(
            r#"
            module:registerPreferences(function() end)
            module.category = "Net"
            module:registerPreferences("http", function() end)
            "#,
        )
        .exec()
        .unwrap();

        let registries = engine.registries.lock();
        let prefs = registries.preferences();
        assert_eq!(prefs["modules/test.lua"].len(), 1);
        assert!(prefs["modules/test.lua"][0].scope.is_none());
        assert_eq!(prefs["Net"][0].scope.as_deref(), Some("http"));
    }

    #[test]
    fn unload_removes_owned_entries() {
        let (lua, engine, _store) = setup(true);
        let removed: usize = lua
            .load(
                r#"
                module:registerCommand("a", function() end)
                module:registerCommand("b", function() end)
                module:registerWatcher(function() end)
                module:registerCommandFinder(function() end)
                return module:unload()
                "#,
            )
            .eval()
            .unwrap();
        assert_eq!(removed, 4);
        assert!(engine.registries.lock().is_empty());
    }

    #[test]
    fn save_lazy_load_persists_command_metadata() {
        let (lua, _engine, store) = setup(true);
        lua.load(
            r#"
            module.category = "Text"
            module:registerCommand("lower", function() end, "Lower case")
            module:registerCommand("upper", function() end)
            module:saveLazyLoad()
            "#,
        )
        .exec()
        .unwrap();

        let record = store.lazy("modules/test.lua").unwrap();
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["lower", "upper"]);
        assert_eq!(
            record.commands["lower"].description.as_deref(),
            Some("Lower case")
        );
        assert_eq!(record.commands["upper"].category.as_deref(), Some("Text"));
    }

    #[test]
    fn set_description_only_for_internal_modules() {
        let (lua, _engine, store) = setup(true);
        lua.load(r#"module:setDescription("Bundled text tools")"#)
            .exec()
            .unwrap();
        assert_eq!(
            store.description("modules/test.lua").as_deref(),
            Some("Bundled text tools")
        );

        let (lua, _engine, _store) = setup(false);
        let err = lua
            .load(r#"module:setDescription("x")"#)
            .exec()
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("setDescription works only with internal modules"));
    }

    #[test]
    fn fields_are_exposed() {
        let (lua, _engine, _store) = setup(false);
        let (path, internal, category): (String, bool, Option<String>) = lua
            .load("return module.filepath, module.isInternal, module.category")
            .eval()
            .unwrap();
        assert_eq!(path, "modules/test.lua");
        assert!(!internal);
        assert!(category.is_none());
    }
}
