//! Tracing writers for the independent terminal and file log layers.
//!
//! Both layers buffer one formatted event and emit it in a single write on
//! [`Drop`], so lines from the two layers never interleave mid-event.
//!
//! - Terminal output goes to stderr. Stdout carries only rewritten text, so
//!   `inline "{upper hi}$" > out.txt` stays clean.
//! - File output appends to the log file. The file layer is built with
//!   `.with_ansi(false)`.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
enum Sink {
    Stderr,
    File(Arc<Mutex<File>>),
}

/// [`MakeWriter`](tracing_subscriber::fmt::MakeWriter) producing one
/// buffered [`EventWriter`] per event.
#[derive(Clone)]
pub struct LogMakeWriter {
    sink: Sink,
}

impl LogMakeWriter {
    pub fn stderr() -> Self {
        Self { sink: Sink::Stderr }
    }

    pub fn file(file: Arc<Mutex<File>>) -> Self {
        Self {
            sink: Sink::File(file),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogMakeWriter {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter {
            sink: self.sink.clone(),
            buf: Vec::with_capacity(256),
        }
    }
}

/// Per-event writer. Flushes its buffer to the sink when dropped.
pub struct EventWriter {
    sink: Sink,
    buf: Vec<u8>,
}

impl Write for EventWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }

        match &self.sink {
            Sink::Stderr => {
                let mut err = io::stderr().lock();
                let _ = err.write_all(&self.buf);
                let _ = err.flush();
            }
            Sink::File(file) => {
                let mut file = file.lock();
                let _ = file.write_all(&self.buf);
                let _ = file.flush();
            }
        }
    }
}

/// Opens the log file in append mode, creating parent directories.
///
/// Returns `None` if the file cannot be opened; file logging is optional.
pub fn open_log_file(path: &Path) -> Option<Arc<Mutex<File>>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!(
                "Warning: cannot create log directory {}: {e}",
                parent.display()
            );
            return None;
        }
    }

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => Some(Arc::new(Mutex::new(file))),
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn file_writer_appends_whole_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("inline.log");
        let file = open_log_file(&path).expect("log file");
        let make = LogMakeWriter::file(file);

        {
            let mut w = make.make_writer();
            w.write_all(b"first ").unwrap();
            w.write_all(b"event\n").unwrap();
            // Nothing reaches the file until the event ends.
            assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        }
        {
            let mut w = make.make_writer();
            w.write_all(b"second event\n").unwrap();
        }

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "first event\nsecond event\n"
        );
    }

    #[test]
    fn unopenable_log_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        assert!(open_log_file(dir.path()).is_none());
    }
}
