//! The `inline` global table.
//!
//! ```lua
//! inline.TYPE_TEXT_CHANGED        -- 16
//! inline.TYPE_SELECTION_CHANGED   -- 8192
//! inline.TYPE_ALL_MASK            -- both
//! inline.log("info", "message")
//! local id = inline.schedule(500, function() ... end [, periodMs])
//! inline.cancel(id)
//! inline.commands()               -- { name = { description, category, lazy } }
//! inline.toast("text")
//! inline.copyToClipboard("text")
//! ```

use crate::engine::Engine;
use crate::error::lua_type_name;
use inline_event::EventMask;
use mlua::{Lua, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Installs the `inline` table into `lua`.
pub(crate) fn install(lua: &Lua, engine: &Arc<Engine>) -> mlua::Result<()> {
    let api = lua.create_table()?;

    api.set("TYPE_TEXT_CHANGED", EventMask::TEXT_CHANGED.bits())?;
    api.set("TYPE_SELECTION_CHANGED", EventMask::SELECTION_CHANGED.bits())?;
    api.set("TYPE_ALL_MASK", EventMask::ALL.bits())?;

    api.set(
        "log",
        lua.create_function(|_, (level, message): (String, String)| {
            match level.to_ascii_lowercase().as_str() {
                "error" => tracing::error!(target: "inline::script", "{message}"),
                "warn" | "warning" => tracing::warn!(target: "inline::script", "{message}"),
                "debug" => tracing::debug!(target: "inline::script", "{message}"),
                "trace" => tracing::trace!(target: "inline::script", "{message}"),
                _ => tracing::info!(target: "inline::script", "{message}"),
            }
            Ok(())
        })?,
    )?;

    let weak: Weak<Engine> = Arc::downgrade(engine);
    api.set(
        "schedule",
        lua.create_function(
            move |_, (delay, callable, period): (u64, Value, Option<u64>)| {
                let Value::Function(callable) = callable else {
                    return Err(mlua::Error::RuntimeError(format!(
                        "bad argument #2 to 'schedule' (function expected, got {})",
                        lua_type_name(&callable)
                    )));
                };
                let engine = Engine::upgrade(&weak)?;
                let id = engine.scheduler.schedule(
                    Duration::from_millis(delay),
                    period.map(Duration::from_millis),
                    callable,
                );
                tracing::trace!(task = id, delay_ms = delay, "scheduled task");
                Ok(id)
            },
        )?,
    )?;

    let weak: Weak<Engine> = Arc::downgrade(engine);
    api.set(
        "cancel",
        lua.create_function(move |_, id: u64| {
            let engine = Engine::upgrade(&weak)?;
            Ok(engine.scheduler.cancel(id))
        })?,
    )?;

    let weak: Weak<Engine> = Arc::downgrade(engine);
    api.set(
        "commands",
        lua.create_function(move |lua, ()| {
            let engine = Engine::upgrade(&weak)?;
            let infos = engine.registries.lock().command_infos();
            let table = lua.create_table()?;
            for info in infos {
                let entry = lua.create_table()?;
                entry.set("description", info.description)?;
                entry.set("category", info.category)?;
                entry.set("lazy", info.lazy)?;
                table.set(info.name, entry)?;
            }
            Ok(table)
        })?,
    )?;

    let weak: Weak<Engine> = Arc::downgrade(engine);
    api.set(
        "toast",
        lua.create_function(move |_, text: String| {
            Engine::upgrade(&weak)?.host.toast(&text);
            Ok(())
        })?,
    )?;

    let weak: Weak<Engine> = Arc::downgrade(engine);
    api.set(
        "copyToClipboard",
        lua.create_function(move |_, text: String| {
            Engine::upgrade(&weak)?.host.copy_to_clipboard(&text);
            Ok(())
        })?,
    )?;

    lua.globals().set("inline", api)
}
