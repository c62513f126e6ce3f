//! Shared registries for commands, watchers, finders and preferences.
//!
//! Every entry records the key of the module that registered it, so a
//! module's `unload()` removes exactly what it owns. The runtime clears the
//! whole set on every environment reload.
//!
//! Not synchronized on its own: the engine keeps it behind one mutex and
//! never holds that lock while calling into Lua.

use inline_event::{EventMask, EventType};
use mlua::Function;
use std::collections::{BTreeMap, HashMap};

/// A registered command.
#[derive(Clone)]
pub struct CommandEntry {
    pub callable: Function,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Key of the owning module.
    pub owner: String,
    /// `true` for lazy-load placeholders.
    pub stub: bool,
}

#[derive(Clone)]
pub struct WatcherEntry {
    pub callable: Function,
    pub mask: EventMask,
    pub owner: String,
}

#[derive(Clone)]
pub struct FinderEntry {
    pub callable: Function,
    pub owner: String,
}

/// One preference panel contribution, opaque to the engine.
#[derive(Clone)]
pub struct PreferenceItem {
    pub scope: Option<String>,
    pub builder: Function,
    pub owner: String,
}

/// Listing view of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub owner: String,
    /// `true` while the owning module has not executed yet.
    pub lazy: bool,
}

/// Counts of entries removed by [`Registries::remove_owned`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnloadSummary {
    pub commands: usize,
    pub watchers: usize,
    pub finders: usize,
    pub preferences: usize,
}

impl UnloadSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.commands + self.watchers + self.finders + self.preferences
    }
}

#[derive(Default)]
pub struct Registries {
    commands: HashMap<String, CommandEntry>,
    watchers: Vec<WatcherEntry>,
    finders: Vec<FinderEntry>,
    preferences: BTreeMap<String, Vec<PreferenceItem>>,
}

impl Registries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Commands ===

    /// Inserts a command, replacing any previous entry with that name.
    pub fn insert_command(&mut self, name: impl Into<String>, entry: CommandEntry) {
        self.commands.insert(name.into(), entry);
    }

    /// Removes the command regardless of owner. Absent names are a no-op.
    pub fn remove_command(&mut self, name: &str) -> Option<CommandEntry> {
        self.commands.remove(name)
    }

    #[must_use]
    pub fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(name)
    }

    #[must_use]
    pub fn callable(&self, name: &str) -> Option<Function> {
        self.commands.get(name).map(|c| c.callable.clone())
    }

    /// Returns the callable only if the entry is a real (non-stub) command.
    #[must_use]
    pub fn loaded_callable(&self, name: &str) -> Option<Function> {
        self.commands
            .get(name)
            .filter(|c| !c.stub)
            .map(|c| c.callable.clone())
    }

    /// Removes the stubs installed for `owner`.
    pub fn remove_stubs(&mut self, owner: &str) -> usize {
        let before = self.commands.len();
        self.commands.retain(|_, c| !(c.stub && c.owner == owner));
        before - self.commands.len()
    }

    /// Names of the commands owned by `owner`, sorted.
    #[must_use]
    pub fn owned_commands(&self, owner: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .filter(|(_, c)| c.owner == owner)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// All commands sorted by name.
    #[must_use]
    pub fn command_infos(&self) -> Vec<CommandInfo> {
        let mut infos: Vec<CommandInfo> = self
            .commands
            .iter()
            .map(|(name, c)| CommandInfo {
                name: name.clone(),
                description: c.description.clone(),
                category: c.category.clone(),
                owner: c.owner.clone(),
                lazy: c.stub,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    // === Watchers ===

    /// Registers a watcher. Re-registering the same function only updates
    /// its mask.
    pub fn upsert_watcher(&mut self, callable: Function, mask: EventMask, owner: &str) {
        if let Some(existing) = self.watchers.iter_mut().find(|w| w.callable == callable) {
            existing.mask = mask;
            return;
        }
        self.watchers.push(WatcherEntry {
            callable,
            mask,
            owner: owner.to_string(),
        });
    }

    pub fn remove_watcher(&mut self, callable: &Function) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|w| &w.callable != callable);
        self.watchers.len() < before
    }

    /// Watchers whose mask covers `event`, in registration order.
    #[must_use]
    pub fn watchers_for(&self, event: EventType) -> Vec<WatcherEntry> {
        self.watchers
            .iter()
            .filter(|w| w.mask.fires_for(event))
            .cloned()
            .collect()
    }

    // === Finders ===

    /// Adds a finder. Finders form a set: adding the same function twice is
    /// a no-op.
    pub fn add_finder(&mut self, callable: Function, owner: &str) -> bool {
        if self.finders.iter().any(|f| f.callable == callable) {
            return false;
        }
        self.finders.push(FinderEntry {
            callable,
            owner: owner.to_string(),
        });
        true
    }

    pub fn remove_finder(&mut self, callable: &Function) -> bool {
        let before = self.finders.len();
        self.finders.retain(|f| &f.callable != callable);
        self.finders.len() < before
    }

    #[must_use]
    pub fn finders(&self) -> Vec<FinderEntry> {
        self.finders.clone()
    }

    // === Preferences ===

    pub fn add_preference(&mut self, category: impl Into<String>, item: PreferenceItem) {
        self.preferences.entry(category.into()).or_default().push(item);
    }

    /// Preference groups keyed by category.
    #[must_use]
    pub fn preferences(&self) -> &BTreeMap<String, Vec<PreferenceItem>> {
        &self.preferences
    }

    // === Lifecycle ===

    /// Removes every entry owned by `owner`.
    pub fn remove_owned(&mut self, owner: &str) -> UnloadSummary {
        let mut summary = UnloadSummary::default();

        let before = self.commands.len();
        self.commands.retain(|_, c| c.owner != owner);
        summary.commands = before - self.commands.len();

        let before = self.watchers.len();
        self.watchers.retain(|w| w.owner != owner);
        summary.watchers = before - self.watchers.len();

        let before = self.finders.len();
        self.finders.retain(|f| f.owner != owner);
        summary.finders = before - self.finders.len();

        for items in self.preferences.values_mut() {
            let before = items.len();
            items.retain(|p| p.owner != owner);
            summary.preferences += before - items.len();
        }
        self.preferences.retain(|_, items| !items.is_empty());

        summary
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.watchers.clear();
        self.finders.clear();
        self.preferences.clear();
    }

    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    #[must_use]
    pub fn finder_count(&self) -> usize {
        self.finders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
            && self.watchers.is_empty()
            && self.finders.is_empty()
            && self.preferences.is_empty()
    }
}
