//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌───────────────────────────────────────────┐
//! │  1. ConfigResolver (CLI flags)            │  Per-invocation
//! ├───────────────────────────────────────────┤
//! │  2. Environment Variables (INLINE_*)      │  Runtime override
//! ├───────────────────────────────────────────┤
//! │  3. Project Config (.inline/config.toml)  │  Project-specific
//! ├───────────────────────────────────────────┤
//! │  4. Global Config (~/.inline/config.toml) │  User defaults
//! ├───────────────────────────────────────────┤
//! │  5. Default Values (compile-time)         │  Fallback
//! └───────────────────────────────────────────┘
//! ```
//!
//! # Directory Structure
//!
//! ```text
//! ~/.inline/
//! ├── config.toml              # Global configuration
//! ├── modules/                 # Default external module directory
//! └── state/
//!     └── modules.json         # Lazy-load metadata, descriptions
//!
//! <project>/.inline/
//! └── config.toml              # Project configuration (overrides global)
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `INLINE_DEBUG` | `debug` | bool |
//! | `INLINE_PATTERN` | `trigger.pattern` | String |
//! | `INLINE_DEBOUNCE_MS` | `trigger.debounce_ms` | u64 |
//! | `INLINE_SELECTION_EVENTS` | `trigger.selection_events` | bool |
//! | `INLINE_SCRIPTS_DIRS` | `scripts.dirs` | path list |
//! | `INLINE_STATE_DIR` | `paths.state_dir` | PathBuf |
//!
//! # Example Configuration
//!
//! ```toml
//! debug = false
//!
//! [scripts]
//! dirs = ["~/.inline/modules"]
//! excluded = ["modules/text.lua"]
//! bundled = true
//!
//! [trigger]
//! pattern = '\{(\S+?)(?:\s([\s\S]+?)\}*)?\}\$'
//! debounce_ms = 300
//! selection_events = false
//!
//! [logging]
//! file = true
//! file_level = "debug"
//! ```

mod error;
mod loader;
mod resolver;
mod types;

pub use error::ConfigError;
pub use loader::{save_global_config, save_config_to, ConfigLoader};
pub use resolver::{ConfigResolver, NoOpResolver};
pub use types::{
    InlineConfig, LoggingConfig, PathsConfig, ScriptsConfig, TriggerConfig, DEFAULT_PATTERN,
};

use std::path::PathBuf;

/// Default global config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".inline")
}

/// Default global config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Default directory for persisted engine state.
pub fn default_state_dir() -> PathBuf {
    default_config_dir().join("state")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".inline";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";

/// Expands a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expansion_leaves_plain_paths() {
        let p = PathBuf::from("/tmp/modules");
        assert_eq!(expand_tilde(&p), p);
    }

    #[test]
    fn default_paths_live_under_dot_inline() {
        assert!(default_config_path().ends_with(".inline/config.toml"));
        assert!(default_state_dir().ends_with(".inline/state"));
    }
}
