//! `iutf8` library: string helpers that count characters, not bytes.
//!
//! Indices are 0-based and `sub` is end-exclusive, matching the positions
//! reported by fields and queries.

use mlua::{Lua, Table, Variadic};

/// Lua pattern matching exactly one UTF-8 encoded character.
const CHAR_PATTERN: &[u8] = b"[\0-\x7F\xC2-\xF4][\x80-\xBF]*";

pub fn create(lua: &Lua) -> mlua::Result<Table> {
    let lib = lua.create_table()?;

    lib.set(
        "len",
        lua.create_function(|_, s: String| Ok(s.chars().count()))?,
    )?;

    lib.set(
        "sub",
        lua.create_function(|_, (s, start, end): (String, Option<i64>, Option<i64>)| {
            Ok(char_slice(&s, start, end))
        })?,
    )?;

    lib.set(
        "char",
        lua.create_function(|_, codes: Variadic<u32>| {
            codes
                .iter()
                .map(|&code| {
                    char::from_u32(code).ok_or_else(|| {
                        mlua::Error::RuntimeError(format!("invalid code point: {code}"))
                    })
                })
                .collect::<mlua::Result<String>>()
        })?,
    )?;

    lib.set(
        "isLower",
        lua.create_function(|_, s: String| Ok(s == s.to_lowercase() && s != s.to_uppercase()))?,
    )?;

    lib.set(
        "isUpper",
        lua.create_function(|_, s: String| Ok(s == s.to_uppercase() && s != s.to_lowercase()))?,
    )?;

    lib.set("charpattern", lua.create_string(CHAR_PATTERN)?)?;

    Ok(lib)
}

/// Returns chars `[start, end)`, both clamped into range.
fn char_slice(s: &str, start: Option<i64>, end: Option<i64>) -> String {
    let len = s.chars().count();
    let clamp = |v: i64| usize::try_from(v.max(0)).unwrap_or(usize::MAX).min(len);
    let start = start.map_or(0, clamp);
    let end = end.map_or(len, clamp);
    if start >= end {
        return String::new();
    }
    s.chars().skip(start).take(end - start).collect()
}
