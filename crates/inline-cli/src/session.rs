//! One terminal session: a runtime, the field it edits, and the meta
//! commands the interactive prompt understands.

use crate::host::TerminalHost;
use anyhow::{Context, Result};
use inline_event::{MemoryField, TextField};
use inline_lua::{LoadReport, RuntimeConfig, ScriptRuntime};
use inline_runtime::{InlineConfig, JsonFileStore, ModuleStore, Notification, RecordingNotifier};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Result of a `:` line at the interactive prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Meta {
    Print(String),
    Quit,
}

pub struct Session {
    runtime: ScriptRuntime,
    field: Arc<MemoryField>,
    notifier: Arc<RecordingNotifier>,
    host: Arc<TerminalHost>,
}

impl Session {
    /// Builds the runtime and creates the first environment.
    pub fn start(
        config: &InlineConfig,
        project_root: &Path,
        host: Arc<TerminalHost>,
    ) -> Result<(Self, LoadReport)> {
        let store = Arc::new(JsonFileStore::open_or_empty(config.state_dir()));
        let notifier = Arc::new(RecordingNotifier::new());

        let mut runtime = ScriptRuntime::builder(RuntimeConfig::from_config(config, Some(project_root)))
            .store(store as Arc<dyn ModuleStore>)
            .notifier(notifier.clone())
            .host(host.clone())
            .build()
            .context("failed to build script runtime")?;
        let report = runtime
            .create_environment()
            .context("failed to create script environment")?;

        let session = Self {
            runtime,
            field: Arc::new(MemoryField::empty()),
            notifier,
            host,
        };
        Ok((session, report))
    }

    /// Replaces the field text with `text`, dispatches, and returns the
    /// rewritten text.
    ///
    /// A rewrite is itself a text change, so it is signalled like an editor
    /// would. The dispatcher then remembers the rewritten text, and typing
    /// `text` again dispatches again.
    pub fn rewrite(&self, text: &str) -> String {
        self.field.type_text(text);
        let field: Arc<dyn TextField> = self.field.clone();
        let report = self.runtime.on_text_changed(&field);
        tracing::debug!(
            matches = report.matches,
            invoked = report.invoked,
            failures = report.failures,
            "dispatched"
        );
        let rewritten = self.field.text();
        if rewritten != text {
            let follow_up = self.runtime.on_text_changed(&field);
            tracing::trace!(matches = follow_up.matches, "rewrite signalled");
        }
        self.field.text()
    }

    pub fn force_load_lazy(&mut self) -> Result<LoadReport> {
        Ok(self.runtime.force_load_lazy()?)
    }

    /// Handles a line starting with `:`. Returns `None` for ordinary text.
    pub fn meta(&mut self, line: &str) -> Option<Result<Meta>> {
        let command = line.trim().strip_prefix(':')?;
        let outcome = match command {
            "q" | "quit" => Ok(Meta::Quit),
            "reload" => self.reload(),
            "lazy" => self
                .force_load_lazy()
                .map(|r| Meta::Print(format!("loaded {} lazy module(s)", r.executed.len()))),
            "commands" => Ok(Meta::Print(self.command_listing())),
            "clip" => Ok(Meta::Print(
                self.host
                    .clipboard()
                    .unwrap_or_else(|| "clipboard is empty".to_string()),
            )),
            other => Ok(Meta::Print(format!(
                "unknown command :{other} (try :commands, :reload, :lazy, :clip, :quit)"
            ))),
        };
        Some(outcome)
    }

    fn reload(&mut self) -> Result<Meta> {
        let report = self.runtime.create_environment()?;
        let mut out = format!(
            "reloaded generation {}: {} executed, {} lazy",
            self.runtime.generation(),
            report.executed.len(),
            report.stubbed.len()
        );
        if let Some(failure) = &report.failure {
            let _ = write!(out, "\nload stopped at {failure}");
        }
        Ok(Meta::Print(out))
    }

    fn command_listing(&self) -> String {
        let commands = self.runtime.commands();
        if commands.is_empty() {
            return "no commands registered".to_string();
        }
        let width = commands.iter().map(|c| c.name.len()).max().unwrap_or(0);
        let mut out = String::new();
        for info in &commands {
            let _ = write!(out, "{:<width$}  ", info.name);
            if let Some(category) = &info.category {
                let _ = write!(out, "[{category}] ");
            }
            out.push_str(info.description.as_deref().unwrap_or(""));
            if info.lazy {
                out.push_str(" (lazy)");
            }
            out.push('\n');
        }
        out.truncate(out.trim_end().len());
        out
    }

    /// Re-dispatches `path` if its content changed since `last`, writing the
    /// result back when a command rewrote it. Returns whether it ran.
    pub fn sync_file(&self, path: &Path, last: &mut Option<String>) -> std::io::Result<bool> {
        let content = std::fs::read_to_string(path)?;
        if last.as_deref() == Some(content.as_str()) {
            return Ok(false);
        }
        let rewritten = self.rewrite(&content);
        if rewritten != content {
            std::fs::write(path, &rewritten)?;
            tracing::info!(path = %path.display(), "rewrote file");
        }
        *last = Some(rewritten);
        Ok(true)
    }

    pub fn run_due_timers(&self) -> usize {
        self.runtime.run_due_timers()
    }

    pub fn next_timer_due(&self) -> Option<Instant> {
        self.runtime.next_timer_due()
    }

    /// Script failures since the last call.
    pub fn take_notifications(&self) -> Vec<Notification> {
        self.notifier.drain()
    }
}
