//! E2E tests for the `inline` binary.
//!
//! Every command runs with HOME and the state directory pointed at a temp
//! dir so no user configuration leaks in.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

const INLINE_VARS: &[&str] = &[
    "INLINE_DEBUG",
    "INLINE_PATTERN",
    "INLINE_DEBOUNCE_MS",
    "INLINE_SELECTION_EVENTS",
    "INLINE_SCRIPTS_DIRS",
    "INLINE_STATE_DIR",
];

/// Isolated command plus the temp dir guard.
fn inline_cmd() -> (assert_cmd::Command, TempDir) {
    let home = tempfile::tempdir().expect("create temp home");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("inline");
    cmd.timeout(TIMEOUT);
    for var in INLINE_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home.path())
        .current_dir(home.path())
        .args(["--state-dir", home.path().join("state").to_str().expect("utf8")]);
    (cmd, home)
}

fn write_module(dir: &Path, name: &str, source: &str) {
    std::fs::write(dir.join(name), source).expect("write module");
}

// ─── One-shot ──────────────────────────────────────────────────────

#[test]
fn one_shot_rewrites_text() {
    let (mut cmd, _home) = inline_cmd();
    cmd.arg("{upper hello}$ and {reverse abc}$")
        .assert()
        .success()
        .stdout("HELLO and cba\n");
}

#[test]
fn one_shot_plain_text_is_unchanged() {
    let (mut cmd, _home) = inline_cmd();
    cmd.args(["nothing", "to", "do"])
        .assert()
        .success()
        .stdout("nothing to do\n");
}

#[test]
fn excluded_module_is_not_loaded() {
    let (mut cmd, _home) = inline_cmd();
    cmd.args(["--exclude", "text.lua", "{upper hello}$"])
        .assert()
        .success()
        .stdout("{upper hello}$\n");
}

#[test]
fn external_module_dir() {
    let (mut cmd, home) = inline_cmd();
    let mods = home.path().join("mods");
    std::fs::create_dir(&mods).unwrap();
    write_module(
        &mods,
        "wave.lua",
        "return function(m) m:registerCommand('wave', function(_, q) q:answer('o/ ' .. q.args) end) end",
    );

    cmd.args(["--no-bundled", "--module-dir"])
        .arg(&mods)
        .arg("{wave there}$ {upper x}$")
        .assert()
        .success()
        .stdout("o/ there {upper x}$\n");
}

#[test]
fn custom_pattern() {
    let (mut cmd, _home) = inline_cmd();
    cmd.args(["--pattern", r"<<(\w+)(?:\s+(.*?))?>>", "<<upper abc>>"])
        .assert()
        .success()
        .stdout("ABC\n");
}

#[test]
fn invalid_pattern_fails() {
    let (mut cmd, _home) = inline_cmd();
    cmd.args(["--pattern", "(unclosed", "text"])
        .assert()
        .failure()
        .stderr(contains("pattern"));
}

#[test]
fn failing_command_is_reported() {
    let (mut cmd, home) = inline_cmd();
    let mods = home.path().join("mods");
    std::fs::create_dir(&mods).unwrap();
    write_module(
        &mods,
        "boom.lua",
        "return function(m) m:registerCommand('boom', function() error('kaboom') end) end",
    );

    cmd.args(["--module-dir"])
        .arg(&mods)
        .arg("{boom}$ {upper ok}$")
        .assert()
        .code(1)
        .stdout("{boom}$ OK\n")
        .stderr(contains("error: [command] boom").and(contains("kaboom")));
}

#[test]
fn broken_module_stops_loading() {
    let (mut cmd, home) = inline_cmd();
    let mods = home.path().join("mods");
    std::fs::create_dir(&mods).unwrap();
    write_module(&mods, "a.lua", "this is not lua");
    write_module(
        &mods,
        "b.lua",
        "return function(m) m:registerCommand('b', function(_, q) q:answer('B') end) end",
    );

    cmd.args(["--no-bundled", "--module-dir"])
        .arg(&mods)
        .arg("{b}$")
        .assert()
        .code(1)
        .stdout("{b}$\n")
        .stderr(contains("error: [load]").and(contains("a.lua")));
}

// ─── Interactive ───────────────────────────────────────────────────

#[test]
fn interactive_lines_and_meta_commands() {
    let (mut cmd, _home) = inline_cmd();
    cmd.write_stdin("{upper a}$\n:commands\n:bogus\nplain\n:quit\n{upper never}$\n")
        .assert()
        .success()
        .stdout(contains("A\n"))
        .stdout(contains("upper"))
        .stdout(contains("unknown command :bogus"))
        .stdout(contains("plain\n"))
        .stdout(contains("NEVER").not());
}

#[test]
fn interactive_same_line_twice() {
    let (mut cmd, _home) = inline_cmd();
    cmd.write_stdin("{upper twice}$\n{upper twice}$\n")
        .assert()
        .success()
        .stdout(contains("TWICE\nTWICE\n"));
}

#[test]
fn interactive_clip_meta_command() {
    let (mut cmd, _home) = inline_cmd();
    cmd.write_stdin(":clip\n{clip hello}$\n:clip\n")
        .assert()
        .success()
        .stdout(contains("clipboard is empty\n"))
        .stdout(contains("\nhello\n"));
}

#[test]
fn interactive_reload_and_lazy() {
    let (mut cmd, _home) = inline_cmd();
    cmd.write_stdin(":reload\n:lazy\n{lower ABC}$\n")
        .assert()
        .success()
        .stdout(contains("reloaded generation"))
        .stdout(contains("lazy module(s)"))
        .stdout(contains("abc\n"));
}

#[test]
fn empty_stdin_exits_gracefully() {
    let (mut cmd, _home) = inline_cmd();
    cmd.write_stdin("").assert().success();
}

#[test]
fn lazy_state_persists_between_runs() {
    let (mut first, home) = inline_cmd();
    first.arg("{upper a}$").assert().success().stdout("A\n");
    assert!(home.path().join("state").join("modules.json").exists());

    let mut second: assert_cmd::Command = cargo_bin_cmd!("inline");
    for var in INLINE_VARS {
        second.env_remove(var);
    }
    second
        .timeout(TIMEOUT)
        .env("HOME", home.path())
        .args(["--state-dir", home.path().join("state").to_str().unwrap()])
        .write_stdin(":commands\n{upper b}$\n")
        .assert()
        .success()
        .stdout(contains("(lazy)"))
        .stdout(contains("B\n"));
}

// ─── Watch ─────────────────────────────────────────────────────────

#[test]
fn watch_rewrites_file_until_removed() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("notes.txt");
    std::fs::write(&file, "say {upper hi}$").unwrap();

    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_inline"))
        .env("HOME", home.path())
        .env("INLINE_DEBOUNCE_MS", "20")
        .arg("--state-dir")
        .arg(home.path().join("state"))
        .arg("--watch")
        .arg(&file)
        .spawn()
        .expect("spawn inline");

    let deadline = Instant::now() + TIMEOUT;
    while std::fs::read_to_string(&file).unwrap_or_default() != "say HI" {
        assert!(Instant::now() < deadline, "file was not rewritten");
        std::thread::sleep(Duration::from_millis(20));
    }

    std::fs::remove_file(&file).unwrap();
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            assert!(status.success());
            break;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("watcher did not exit");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn watch_missing_file_fails() {
    let (mut cmd, home) = inline_cmd();
    cmd.arg("--watch")
        .arg(home.path().join("missing.txt"))
        .assert()
        .failure()
        .stderr(contains("cannot watch"));
}
