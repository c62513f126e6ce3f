//! `utils` library: argument parsing and command wrappers.
//!
//! ```lua
//! local utils = require "utils"
//!
//! -- {swap a b}$ -> "b a"; anything but two arguments answers "Wrong arguments"
//! module:registerCommand("swap", utils.command(function(field, query, args)
//!     query:answer(args[2] .. " " .. args[1])
//! end, 2))
//!
//! -- {shout}$ answers "Empty argument"
//! module:registerCommand("shout", utils.hasArgs(function(field, query)
//!     query:answer(query.args:upper())
//! end))
//! ```

use super::tokenizer::tokenize;
use crate::query::QueryHandle;
use mlua::{AnyUserData, Function, Lua, Table, Value};
use regex::Regex;

const WRONG_ARGUMENTS: &str = "Wrong arguments";
const EMPTY_ARGUMENT: &str = "Empty argument";

pub fn create(lua: &Lua) -> mlua::Result<Table> {
    let lib = lua.create_table()?;

    lib.set(
        "split",
        lua.create_function(|lua, (s, pattern, limit): (String, String, Option<usize>)| {
            let re = Regex::new(&pattern).map_err(mlua::Error::external)?;
            let parts: Vec<&str> = match limit {
                Some(n) if n > 0 => re.splitn(&s, n).collect(),
                _ => re.split(&s).collect(),
            };
            lua.create_sequence_from(parts)
        })?,
    )?;

    lib.set(
        "escape",
        lua.create_function(|_, s: String| Ok(escape_pattern(&s)))?,
    )?;

    lib.set(
        "parseArgs",
        lua.create_function(|lua, s: String| lua.create_sequence_from(tokenize(&s)))?,
    )?;

    lib.set(
        "command",
        lua.create_function(
            |lua, (callable, count, on_error): (Function, usize, Option<Function>)| {
                lua.create_function(move |lua, (field, query): (Value, AnyUserData)| {
                    let handle: QueryHandle = (*query.borrow::<QueryHandle>()?).clone();
                    let args = tokenize(&handle.args());

                    if args.len() == count {
                        let table = lua.create_sequence_from(args)?;
                        return callable.call::<Value>((field, query, table));
                    }
                    if let Some(ref on_error) = on_error {
                        return on_error.call::<Value>((field, query));
                    }
                    handle.answer(Some(WRONG_ARGUMENTS), false);
                    Ok(Value::Nil)
                })
            },
        )?,
    )?;

    lib.set(
        "hasArgs",
        lua.create_function(|lua, (callable, on_error): (Function, Option<Function>)| {
            lua.create_function(move |_, (field, query): (Value, AnyUserData)| {
                let handle: QueryHandle = (*query.borrow::<QueryHandle>()?).clone();

                if handle.args().is_empty() {
                    if let Some(ref on_error) = on_error {
                        return on_error.call::<Value>((field, query));
                    }
                    handle.answer(Some(EMPTY_ARGUMENT), false);
                    return Ok(Value::Nil);
                }
                callable.call::<Value>((field, query))
            })
        })?,
    )?;

    Ok(lib)
}

/// Escapes Lua pattern magic characters with `%`.
fn escape_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '(' | ')' | '.' | '%' | '+' | '-' | '*' | '?' | '[' | ']' | '^' | '$'
        ) {
            out.push('%');
        }
        out.push(c);
    }
    out
}
