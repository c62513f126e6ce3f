//! inline - run text-rewriting Lua commands from the terminal
//!
//! # Modes
//!
//! - One-shot: `inline "{upper hello}$"` prints `HELLO`.
//! - Interactive: with no TEXT, every stdin line is dispatched as the new
//!   field content and the result printed. Lines starting with `:` are meta
//!   commands (`:commands`, `:reload`, `:lazy`, `:quit`).
//! - Watch: `inline --watch notes.txt` polls the file and writes back any
//!   rewrite, until the file is removed.
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`INLINE_*`)
//! 3. Project config (`.inline/config.toml` under the project root)
//! 4. Global config (`~/.inline/config.toml`)
//! 5. Default values (lowest priority)

mod host;
mod session;
mod tracing_writer;

use anyhow::{Context, Result};
use clap::Parser;
use host::TerminalHost;
use inline_lua::LoadReport;
use inline_runtime::{ConfigLoader, ConfigResolver, InlineConfig};
use session::{Meta, Session};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Run text-rewriting Lua commands from the terminal
#[derive(Parser, Debug)]
#[command(name = "inline")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Additional module directory (repeatable)
    #[arg(long = "module-dir", value_name = "DIR")]
    module_dirs: Vec<PathBuf>,

    /// Never load this module: key, file name or directory (repeatable)
    #[arg(long, value_name = "NAME")]
    exclude: Vec<String>,

    /// Skip the modules built into the binary
    #[arg(long)]
    no_bundled: bool,

    /// Trigger pattern (group 1: command name, group 2: arguments)
    #[arg(long, value_name = "REGEX")]
    pattern: Option<String>,

    /// Directory holding lazy-load metadata (also: INLINE_STATE_DIR)
    #[arg(long, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Execute every lazily loaded module right after startup
    #[arg(long)]
    force_lazy: bool,

    /// Watch FILE and rewrite it in place
    #[arg(long, value_name = "FILE", conflicts_with = "text")]
    watch: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// File log level (default: debug)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Text to rewrite (one-shot mode)
    #[arg(trailing_var_arg = true)]
    text: Vec<String>,
}

/// CLI-based configuration resolver.
///
/// Loads file/env config via [`ConfigLoader`] and applies CLI argument
/// overrides as the highest-priority layer.
struct CliConfigResolver {
    project_root: PathBuf,
    debug: bool,
    module_dirs: Vec<PathBuf>,
    excluded: Vec<String>,
    no_bundled: bool,
    pattern: Option<String>,
    state_dir: Option<PathBuf>,
    log_file: Option<PathBuf>,
    log_level: Option<String>,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        let project_root = args.project.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to get current directory, using '.'");
                PathBuf::from(".")
            })
        });

        // Directories given on the command line are relative to the shell,
        // not the project root.
        let module_dirs = args
            .module_dirs
            .iter()
            .map(|d| std::path::absolute(d).unwrap_or_else(|_| d.clone()))
            .collect();

        Self {
            project_root,
            debug: args.debug,
            module_dirs,
            excluded: args.exclude.clone(),
            no_bundled: args.no_bundled,
            pattern: args.pattern.clone(),
            state_dir: args.state_dir.clone(),
            log_file: args.log_file.clone(),
            log_level: args.log_level.clone(),
        }
    }

    fn resolve(&self) -> Result<InlineConfig> {
        self.resolve_with(ConfigLoader::new().with_project_root(&self.project_root))
    }

    fn resolve_with(&self, loader: ConfigLoader) -> Result<InlineConfig> {
        let mut config = loader.load().context("Config error")?;
        self.apply(&mut config);
        Ok(config)
    }
}

impl ConfigResolver for CliConfigResolver {
    fn apply(&self, config: &mut InlineConfig) {
        if self.debug {
            config.debug = true;
        }
        for dir in &self.module_dirs {
            if !config.scripts.dirs.contains(dir) {
                config.scripts.dirs.push(dir.clone());
            }
        }
        config.scripts.excluded.extend(self.excluded.iter().cloned());
        if self.no_bundled {
            config.scripts.bundled = false;
        }
        if let Some(ref pattern) = self.pattern {
            config.trigger.pattern.clone_from(pattern);
        }
        if let Some(ref dir) = self.state_dir {
            config.paths.state_dir = Some(dir.clone());
        }
        if let Some(ref path) = self.log_file {
            config.logging.file = true;
            config.logging.file_path = Some(path.clone());
        }
        if let Some(ref level) = self.log_level {
            config.logging.file_level.clone_from(level);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let resolver = CliConfigResolver::from_args(&args);
    let config = resolver.resolve()?;

    init_tracing(&args, &config);
    info!(path = %resolver.project_root.display(), "Project root");

    let host = Arc::new(TerminalHost::new());
    let (mut session, report) = Session::start(&config, &resolver.project_root, host)?;
    log_load(&report);

    if args.force_lazy {
        let forced = session.force_load_lazy()?;
        log_load(&forced);
    }

    if let Some(path) = args.watch {
        let debounce = Duration::from_millis(config.trigger.debounce_ms.max(1));
        return watch(&session, &path, debounce).await;
    }

    if args.text.is_empty() {
        return interactive(&mut session).await;
    }

    let output = session.rewrite(&args.text.join(" "));
    session.run_due_timers();
    println!("{output}");
    if print_notifications(&session) > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Terminal filter: `--debug` > `--verbose` > `RUST_LOG` > `warn`.
/// The file layer has its own filter from `logging.file_level`.
fn init_tracing(args: &Args, config: &InlineConfig) {
    let terminal_filter = if args.debug || config.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let terminal_layer = fmt::layer()
        .with_target(false)
        .with_writer(tracing_writer::LogMakeWriter::stderr());

    let log_file = if config.logging.file {
        tracing_writer::open_log_file(&config.logging.resolved_path())
    } else {
        None
    };

    if let Some(file) = log_file {
        let file_filter = EnvFilter::try_new(&config.logging.file_level)
            .unwrap_or_else(|_| EnvFilter::new("debug"));
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(tracing_writer::LogMakeWriter::file(file));

        tracing_subscriber::registry()
            .with(terminal_layer.with_filter(terminal_filter))
            .with(file_layer.with_filter(file_filter))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(terminal_layer.with_filter(terminal_filter))
            .init();
    }
}

fn log_load(report: &LoadReport) {
    info!(
        executed = report.executed.len(),
        stubbed = report.stubbed.len(),
        excluded = report.excluded.len(),
        "Modules loaded"
    );
}

/// Prints script failures to stderr and returns how many there were.
fn print_notifications(session: &Session) -> usize {
    let notes = session.take_notifications();
    for n in &notes {
        eprintln!("error: {n}");
    }
    notes.len()
}

async fn sleep_until_due(due: Option<Instant>) {
    match due {
        Some(due) => tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await,
        None => std::future::pending().await,
    }
}

/// Reads stdin line by line. Timers fire between lines.
async fn interactive(session: &mut Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_notifications(session);

    loop {
        let due = session.next_timer_due();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match session.meta(&line) {
                    Some(Ok(Meta::Quit)) => break,
                    Some(Ok(Meta::Print(text))) => println!("{text}"),
                    Some(Err(e)) => eprintln!("error: {e:#}"),
                    None => println!("{}", session.rewrite(&line)),
                }
            }
            () = sleep_until_due(due) => {
                session.run_due_timers();
            }
        }
        print_notifications(session);
    }

    info!("Interactive session ended");
    Ok(())
}

/// Polls `path` every `interval` until it disappears.
async fn watch(session: &Session, path: &Path, interval: Duration) -> Result<()> {
    anyhow::ensure!(path.is_file(), "cannot watch {}: not a file", path.display());
    info!(path = %path.display(), interval_ms = interval.as_millis() as u64, "Watching");

    let mut poll = tokio::time::interval(interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last = None;

    loop {
        let due = session.next_timer_due();
        tokio::select! {
            _ = poll.tick() => {
                match session.sync_file(path, &mut last) {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        info!(path = %path.display(), "Watched file removed");
                        break;
                    }
                    Err(e) => {
                        return Err(e).with_context(|| format!("failed to sync {}", path.display()));
                    }
                }
            }
            () = sleep_until_due(due) => {
                session.run_due_timers();
            }
        }
        print_notifications(session);
    }
    Ok(())
}
