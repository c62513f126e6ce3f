//! Configuration resolver trait for per-invocation overrides.
//!
//! ```text
//! ConfigLoader.load()  →  InlineConfig (base)
//!                              │
//!                              ▼
//!                     ConfigResolver.apply()
//!                              │
//!                              ▼
//!                     InlineConfig (final)
//! ```

use super::InlineConfig;

/// Applies overrides (typically CLI flags) on top of a loaded config.
pub trait ConfigResolver {
    /// Applies overrides to the given configuration.
    ///
    /// Unspecified options must leave existing values untouched.
    fn apply(&self, config: &mut InlineConfig);
}

/// Resolver that makes no changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpResolver;

impl ConfigResolver for NoOpResolver {
    fn apply(&self, _config: &mut InlineConfig) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_resolver_does_nothing() {
        let mut config = InlineConfig::default();
        let original = config.clone();

        NoOpResolver.apply(&mut config);

        assert_eq!(config, original);
    }

    #[test]
    fn custom_resolver() {
        struct Excluder(&'static str);

        impl ConfigResolver for Excluder {
            fn apply(&self, config: &mut InlineConfig) {
                config.scripts.excluded.insert(self.0.to_string());
            }
        }

        let mut config = InlineConfig::default();
        Excluder("modules/text.lua").apply(&mut config);

        assert!(config.scripts.excluded.contains("modules/text.lua"));
    }
}
