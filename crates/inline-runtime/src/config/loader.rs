//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.inline/config.toml`)
//! 3. Project config (`.inline/config.toml`)
//! 4. Environment variables (`INLINE_*`)
//!
//! Each layer overrides the previous.

use super::{
    default_config_path, ConfigError, InlineConfig, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parses a boolean environment variable into `$field`.
macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// ```ignore
/// use inline_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root("/path/to/project")
///     .skip_env_vars()
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to ~/.inline/config.toml).
    global_config_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets the project root directory.
    ///
    /// Project config is read from `<project_root>/.inline/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variable loading. Useful for deterministic tests.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file exists but cannot be parsed,
    /// or an `INLINE_*` variable is malformed. Missing files are ignored.
    pub fn load(&self) -> Result<InlineConfig, ConfigError> {
        let mut config = InlineConfig::default();

        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global) = load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.merge(&global);
            }
        }

        if !self.skip_project {
            if let Some(ref project_root) = self.project_root {
                let path = project_root
                    .join(PROJECT_CONFIG_DIR)
                    .join(PROJECT_CONFIG_FILE);

                if let Some(project) = load_file(&path)? {
                    debug!(
                        path = %path.display(),
                        project = %project_root.display(),
                        "Loaded project config"
                    );
                    config.merge(&project);
                }
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        Ok(config)
    }
}

fn load_file(path: &Path) -> Result<Option<InlineConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config =
        InlineConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

    Ok(Some(config))
}

fn apply_env_vars(config: &mut InlineConfig) -> Result<(), ConfigError> {
    parse_env_bool!(config.debug, "INLINE_DEBUG");
    parse_env_bool!(config.trigger.selection_events, "INLINE_SELECTION_EVENTS");

    if let Ok(val) = std::env::var("INLINE_PATTERN") {
        config.trigger.pattern = val;
    }

    if let Ok(val) = std::env::var("INLINE_DEBOUNCE_MS") {
        config.trigger.debounce_ms = val
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid_env_var("INLINE_DEBOUNCE_MS", "expected integer"))?;
    }

    if let Some(val) = std::env::var_os("INLINE_SCRIPTS_DIRS") {
        for dir in std::env::split_paths(&val) {
            if !dir.as_os_str().is_empty() && !config.scripts.dirs.contains(&dir) {
                config.scripts.dirs.push(dir);
            }
        }
    }

    if let Ok(val) = std::env::var("INLINE_STATE_DIR") {
        config.paths.state_dir = Some(PathBuf::from(val));
    }

    Ok(())
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off" (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Saves a config to the global config file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be written.
pub fn save_global_config(config: &InlineConfig) -> Result<(), ConfigError> {
    save_config_to(config, &default_config_path())
}

/// Saves a config to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError`] if the directory or file cannot be written.
pub fn save_config_to(config: &InlineConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let toml = config.to_toml()?;
    std::fs::write(path, toml).map_err(|e| ConfigError::write_file(path, e))?;
    debug!(path = %path.display(), "Saved config");

    Ok(())
}
