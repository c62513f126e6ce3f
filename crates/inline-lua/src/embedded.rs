//! Bundled modules.
//!
//! Embedded at compile time with `include_str!` and loaded before external
//! modules, in name order. Their module key is `modules/<file>`.

/// Case conversion and character tools.
pub const TEXT: &str = include_str!("../modules/text.lua");

/// `help` command.
pub const HELP: &str = include_str!("../modules/help.lua");

/// `calc` command.
pub const CALC: &str = include_str!("../modules/calc.lua");

/// `rep<N>` finder.
pub const REPEAT: &str = include_str!("../modules/repeat.lua");

/// `date`, `clip`, `remind`.
pub const TOOLS: &str = include_str!("../modules/tools.lua");

/// All bundled modules as `(file name, source)`, sorted by file name.
#[must_use]
pub fn all() -> Vec<(&'static str, &'static str)> {
    vec![
        ("calc.lua", CALC),
        ("help.lua", HELP),
        ("repeat.lua", REPEAT),
        ("text.lua", TEXT),
        ("tools.lua", TOOLS),
    ]
}

#[must_use]
pub fn get(name: &str) -> Option<&'static str> {
    all()
        .into_iter()
        .find(|(file, _)| *file == name)
        .map(|(_, source)| source)
}

/// Bundled file names.
#[must_use]
pub fn list() -> Vec<&'static str> {
    all().into_iter().map(|(name, _)| name).collect()
}
