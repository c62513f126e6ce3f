//! `json` library.
//!
//! ```lua
//! local json = require "json"
//! local s = json.dump({ a = 1, list = { 1, 2 } })
//! local t = json.load(s)
//! local n = json.null      -- JSON null, distinct from nil
//! ```
//!
//! Tables with consecutive integer keys from 1 encode as arrays, everything
//! else (including the empty table) as objects. Cycles are an error.

use crate::error::lua_type_name;
use mlua::{Lua, LuaSerdeExt, Table, Value};

pub fn create(lua: &Lua) -> mlua::Result<Table> {
    let lib = lua.create_table()?;

    lib.set(
        "dump",
        lua.create_function(|lua, value: Value| {
            if !matches!(value, Value::Table(_)) {
                return Err(mlua::Error::RuntimeError(format!(
                    "bad argument #1 to 'dump' (table expected, got {})",
                    lua_type_name(&value)
                )));
            }
            let json: serde_json::Value = lua.from_value(value)?;
            serde_json::to_string(&json).map_err(mlua::Error::external)
        })?,
    )?;

    lib.set(
        "load",
        lua.create_function(|lua, text: String| {
            let json: serde_json::Value =
                serde_json::from_str(&text).map_err(mlua::Error::external)?;
            lua.to_value(&json)
        })?,
    )?;

    lib.set("null", lua.null())?;

    Ok(lib)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lua_with_json() -> Lua {
        let lua = Lua::new();
        let lib = create(&lua).unwrap();
        lua.globals().set("json", lib).unwrap();
        lua
    }

    #[test]
    fn dump_object_and_array() {
        let lua = lua_with_json();
        let s: String = lua
            .load(r#"return json.dump({ name = "x", list = { 1, 2, 3 } })"#)
            .eval()
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(parsed["name"], "x");
        assert_eq!(parsed["list"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn load_nested() {
        let lua = lua_with_json();
        let n: i64 = lua
            .load(r#"return json.load('{"a": {"b": [10, 20]}}').a.b[2]"#)
            .eval()
            .unwrap();
        assert_eq!(n, 20);
    }

    #[test]
    fn null_roundtrip() {
        let lua = lua_with_json();
        let ok: bool = lua
            .load(r#"return json.load('{"v": null}').v == json.null"#)
            .eval()
            .unwrap();
        assert!(ok);

        let s: String = lua.load(r#"return json.dump({ v = json.null })"#).eval().unwrap();
        assert_eq!(s, r#"{"v":null}"#);
    }

    #[test]
    fn cycles_and_bad_input_error() {
        let lua = lua_with_json();
        assert!(lua
            .load("local t = {}; t.self = t; return json.dump(t)")
            .exec()
            .is_err());
        assert!(lua.load("return json.load('{oops')").exec().is_err());
        assert!(lua.load("return json.dump(5)").exec().is_err());
    }
}
