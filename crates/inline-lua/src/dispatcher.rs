//! Trigger-pattern scanning and per-match dispatch.
//!
//! One text-change signal is one pass:
//!
//! ```text
//! same field and text as the last signal? → stop
//! notify TEXT_CHANGED watchers
//! snapshot = field.text()                 positions come from here only
//! live     = snapshot                     content each command sees
//! for each match in snapshot (left to right, non-overlapping):
//!     callable = commands[name]
//!     for each finder: (callable, args) = finder(name, args, callable)
//!     no callable → leave the match alone
//!     query = Query(field, live, match, args)
//!     callable(field, query); live = query.text
//! ```
//!
//! Matches are never searched for in `live`, so a command's output cannot
//! re-trigger anything within the same pass.

use crate::engine::Engine;
use crate::field::FieldHandle;
use crate::query::QueryHandle;
use inline_event::{EventType, FieldId, TextField};
use inline_runtime::NotificationSource;
use mlua::{Function, Value};
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// What one signal did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Same field and text as the previous signal.
    pub deduplicated: bool,
    pub watchers: usize,
    pub matches: usize,
    pub invoked: usize,
    /// Watcher, finder and command errors, each reported individually.
    pub failures: usize,
}

pub struct Dispatcher {
    pattern: Regex,
    /// Only the most recent signal is remembered.
    last_seen: Mutex<Option<(FieldId, String)>>,
}

impl Dispatcher {
    /// Compiles the trigger pattern. `.` also matches newlines.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern)
            .dot_matches_new_line(true)
            .build()?;
        Ok(Self {
            pattern,
            last_seen: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Forgets the last signal.
    pub fn reset(&self) {
        *self.last_seen.lock() = None;
    }

    /// Handles a text-change signal.
    pub fn on_text_changed(&self, engine: &Engine, field: &Arc<dyn TextField>) -> DispatchReport {
        let mut report = DispatchReport::default();

        let observed = field.text();
        {
            let mut last_seen = self.last_seen.lock();
            if let Some((id, text)) = last_seen.as_ref() {
                if *id == field.id() && *text == observed {
                    report.deduplicated = true;
                    return report;
                }
            }
            *last_seen = Some((field.id(), observed));
        }

        let handle = FieldHandle::new(Arc::clone(field));
        self.notify_watchers(engine, &handle, EventType::TextChanged, &mut report);

        let snapshot = field.text();
        let mut live = snapshot.clone();

        for caps in self.pattern.captures_iter(&snapshot) {
            let Some(expression) = caps.get(0) else {
                continue;
            };
            let name = caps.get(1).map_or("", |m| m.as_str());
            let args = caps.get(2).map_or("", |m| m.as_str()).to_string();
            report.matches += 1;

            let callable = engine.registries.lock().callable(name);
            let (callable, args) = self.run_finders(engine, name, callable, args, &mut report);
            let Some(callable) = callable else {
                tracing::trace!(command = %name, "no command for match");
                continue;
            };

            let query = QueryHandle::new(
                Arc::clone(field),
                live.clone(),
                expression.as_str().to_string(),
                args,
            );
            match callable.call::<()>((handle.clone(), query.clone())) {
                Ok(()) => report.invoked += 1,
                Err(e) => {
                    report.failures += 1;
                    engine.notify(NotificationSource::Command, name, e);
                }
            }
            live = query.text();
        }

        tracing::debug!(
            field = %field.id(),
            watchers = report.watchers,
            matches = report.matches,
            invoked = report.invoked,
            failures = report.failures,
            "dispatch pass finished"
        );
        report
    }

    /// Handles a selection-change signal: watchers only, no scanning.
    pub fn on_selection_changed(
        &self,
        engine: &Engine,
        field: &Arc<dyn TextField>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let handle = FieldHandle::new(Arc::clone(field));
        self.notify_watchers(engine, &handle, EventType::SelectionChanged, &mut report);
        report
    }

    fn notify_watchers(
        &self,
        engine: &Engine,
        handle: &FieldHandle,
        event: EventType,
        report: &mut DispatchReport,
    ) {
        let watchers = engine.registries.lock().watchers_for(event);
        for watcher in watchers {
            report.watchers += 1;
            if let Err(e) = watcher.callable.call::<()>((handle.clone(), event.code())) {
                report.failures += 1;
                engine.notify(NotificationSource::Watcher, &watcher.owner, e);
            }
        }
    }

    /// Lets every finder override the callable and the argument string.
    ///
    /// A finder returning a function replaces the callable; a string as
    /// second value replaces the arguments. Anything else is ignored.
    fn run_finders(
        &self,
        engine: &Engine,
        name: &str,
        mut callable: Option<Function>,
        mut args: String,
        report: &mut DispatchReport,
    ) -> (Option<Function>, String) {
        let finders = engine.registries.lock().finders();
        for finder in finders {
            let current = callable.clone().map_or(Value::Nil, Value::Function);
            match finder
                .callable
                .call::<(Value, Value)>((name, args.as_str(), current))
            {
                Ok((found, new_args)) => {
                    if let Value::Function(f) = found {
                        callable = Some(f);
                    }
                    if let Value::String(s) = new_args {
                        args = s.to_string_lossy();
                    }
                }
                Err(e) => {
                    report.failures += 1;
                    engine.notify(NotificationSource::Finder, &finder.owner, e);
                }
            }
        }
        (callable, args)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}
