//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use super::expand_tilde;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Default trigger pattern.
///
/// Group 1 is the command name, group 2 the optional argument text:
/// `{upper hello}$` yields `("upper", "hello")`.
pub const DEFAULT_PATTERN: &str = r"\{(\S+?)(?:\s([\s\S]+?)\}*)?\}\$";

/// Main configuration structure, the result of merging every layer.
///
/// ```
/// use inline_runtime::config::InlineConfig;
///
/// let config = InlineConfig::default();
/// assert!(!config.debug);
/// assert!(config.scripts.bundled);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InlineConfig {
    /// Enable debug mode (verbose logging, diagnostics).
    pub debug: bool,

    pub scripts: ScriptsConfig,

    pub trigger: TriggerConfig,

    pub paths: PathsConfig,

    pub logging: LoggingConfig,
}

impl InlineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default.
    pub fn merge(&mut self, other: &Self) {
        if other.debug {
            self.debug = true;
        }

        self.scripts.merge(&other.scripts);
        self.trigger.merge(&other.trigger);
        self.paths.merge(&other.paths);
        self.logging.merge(&other.logging);
    }

    /// Returns the state directory, falling back to `~/.inline/state`.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.paths
            .state_dir
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(super::default_state_dir)
    }
}

/// Module source configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptsConfig {
    /// External module directories, in load order.
    ///
    /// `~` is expanded; relative paths resolve against the project root.
    pub dirs: Vec<PathBuf>,

    /// Modules that are never loaded.
    ///
    /// An entry matches a module key (`modules/text.lua` or an absolute
    /// path), a bare file name, or a directory containing the module.
    pub excluded: BTreeSet<String>,

    /// Load the modules shipped inside the binary.
    pub bundled: bool,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            excluded: BTreeSet::new(),
            bundled: true,
        }
    }
}

impl ScriptsConfig {
    /// Resolves configured directories with tilde expansion and project root.
    ///
    /// Non-existent directories are filtered out. Duplicates keep their
    /// first position.
    #[must_use]
    pub fn resolve_dirs(&self, project_root: Option<&Path>) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = Vec::new();
        for dir in &self.dirs {
            let expanded = expand_tilde(dir);
            let resolved = if expanded.is_absolute() {
                expanded
            } else if let Some(root) = project_root {
                root.join(&expanded)
            } else {
                continue;
            };
            if resolved.is_dir() && !out.contains(&resolved) {
                out.push(resolved);
            }
        }
        out
    }

    fn merge(&mut self, other: &Self) {
        // Directories and exclusions accumulate across layers.
        for dir in &other.dirs {
            if !self.dirs.contains(dir) {
                self.dirs.push(dir.clone());
            }
        }
        self.excluded.extend(other.excluded.iter().cloned());
        if !other.bundled {
            self.bundled = false;
        }
    }
}

/// Trigger pattern and event delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriggerConfig {
    /// Regular expression marking a command invocation.
    pub pattern: String,

    /// Quiet period before a text change is dispatched, in milliseconds.
    pub debounce_ms: u64,

    /// Deliver selection-change events to watchers.
    pub selection_events: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.into(),
            debounce_ms: 300,
            selection_events: false,
        }
    }
}

impl TriggerConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.pattern != default.pattern {
            self.pattern = other.pattern.clone();
        }
        if other.debounce_ms != default.debounce_ms {
            self.debounce_ms = other.debounce_ms;
        }
        if other.selection_events != default.selection_events {
            self.selection_events = other.selection_events;
        }
    }
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Where `modules.json` lives. Defaults to `~/.inline/state`.
    pub state_dir: Option<PathBuf>,
}

impl PathsConfig {
    fn merge(&mut self, other: &Self) {
        if other.state_dir.is_some() {
            self.state_dir = other.state_dir.clone();
        }
    }
}

/// File logging configuration. Terminal logging is controlled by flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write logs to a file in addition to the terminal.
    pub file: bool,

    /// Log file location. Defaults to `~/.inline/inline.log`.
    pub file_path: Option<PathBuf>,

    /// `EnvFilter` directive for the file layer.
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: false,
            file_path: None,
            file_level: "debug".into(),
        }
    }
}

impl LoggingConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.file != default.file {
            self.file = other.file;
        }
        if other.file_path.is_some() {
            self.file_path = other.file_path.clone();
        }
        if other.file_level != default.file_level {
            self.file_level = other.file_level.clone();
        }
    }

    /// Resolved log file path.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        self.file_path
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| super::default_config_dir().join("inline.log"))
    }
}
