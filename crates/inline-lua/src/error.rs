//! Error types for the script runtime.

use inline_runtime::StoreError;
use mlua::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building environments or loading modules.
#[derive(Debug, Error)]
pub enum LuaError {
    /// Lua compile or runtime error.
    #[error("lua error: {0}")]
    Runtime(#[from] mlua::Error),

    /// Module source not found.
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    /// Module source unusable (bad encoding, VM setup failure).
    #[error("invalid script: {0}")]
    InvalidScript(String),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The trigger pattern does not compile.
    #[error("invalid trigger pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("module store: {0}")]
    Store(#[from] StoreError),
}

impl LuaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// The name Lua's `type()` gives `value`. Integers and floats are both
/// `number` there, unlike [`Value::type_name`].
pub(crate) fn lua_type_name(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) | Value::Number(_) => "number",
        Value::LightUserData(_) => "userdata",
        other => other.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_error_converts() {
        let err: LuaError = regex::Regex::new("(").unwrap_err().into();
        assert!(err.to_string().starts_with("invalid trigger pattern"));
    }

    #[test]
    fn lua_error_converts() {
        let err: LuaError = mlua::Error::RuntimeError("boom".into()).into();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn numbers_share_one_type_name() {
        assert_eq!(lua_type_name(&Value::Integer(1)), "number");
        assert_eq!(lua_type_name(&Value::Number(1.5)), "number");
        assert_eq!(lua_type_name(&Value::Nil), "nil");
        assert_eq!(lua_type_name(&Value::Boolean(true)), "boolean");
    }
}
