//! Decoupled logging pipeline for provisioning runs.
//!
//! # Architecture
//!
//! ```text
//! log::info!/warn!/error!, log_parsed!
//!     |
//! [LogCollector] (implements log::Log, never blocks the caller)
//!     | (crossbeam unbounded channel)
//!     v
//! [DiskPersister thread]
//!     |-> <log_dir>/full/<ts>_full.log       every record
//!     |-> <log_dir>/parsed/<ts>_parsed.log   milestones (target "parsed")
//!     '-> stderr                             milestones, warnings, errors
//! ```
//!
//! When the log directory cannot be created the collector still runs, with
//! stderr as its only sink.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Internal log line or special marker
enum LogMessage {
    Line(LogLine),
    /// Flush marker with channel sender to signal completion
    Flush(std::sync::mpsc::Sender<()>),
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    /// Milestone lines also go to the parsed log
    pub parsed: bool,
    /// Echo to stderr as well as disk
    pub echo: bool,
    pub timestamp: String,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            parsed: false,
            echo: false,
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    pub fn parsed(message: String) -> Self {
        LogLine {
            parsed: true,
            echo: true,
            ..LogLine::new(message)
        }
    }

    pub fn echoed(mut self) -> Self {
        self.echo = true;
        self
    }
}

/// Files one run writes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionFiles {
    pub full: PathBuf,
    pub parsed: PathBuf,
}

impl SessionFiles {
    /// Fresh `<ts>_full.log` / `<ts>_parsed.log` pair under `log_dir`.
    pub fn create(log_dir: &Path) -> Result<Self, String> {
        let full_dir = log_dir.join("full");
        let parsed_dir = log_dir.join("parsed");
        std::fs::create_dir_all(&full_dir)
            .map_err(|e| format!("Failed to create full log dir: {}", e))?;
        std::fs::create_dir_all(&parsed_dir)
            .map_err(|e| format!("Failed to create parsed log dir: {}", e))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        Ok(SessionFiles {
            full: full_dir.join(format!("{}_full.log", stamp)),
            parsed: parsed_dir.join(format!("{}_parsed.log", stamp)),
        })
    }
}

/// Global `log` backend; cheap to clone, all clones share one persister thread.
#[derive(Clone)]
pub struct LogCollector {
    tx: Sender<LogMessage>,
    session: Option<SessionFiles>,
    max_level: LevelFilter,
}

impl LogCollector {
    /// Persist to `log_dir` and echo milestones to stderr.
    pub fn new(log_dir: &Path) -> Result<Self, String> {
        let session = SessionFiles::create(log_dir)?;
        let full = open_append(&session.full)?;
        let parsed = open_append(&session.parsed)?;
        Ok(Self::spawn(Some(session), Some(full), Some(parsed)))
    }

    /// No disk sink at all: milestones, warnings and errors go to stderr.
    pub fn stderr_only() -> Self {
        Self::spawn(None, None, None)
    }

    /// Disk logging when possible, otherwise stderr only. Never fails.
    pub fn new_or_stderr(log_dir: &Path) -> Self {
        match LogCollector::new(log_dir) {
            Ok(collector) => collector,
            Err(e) => {
                eprintln!(
                    "[Log] Cannot log to {}: {}. Logging to stderr only.",
                    log_dir.display(),
                    e
                );
                LogCollector::stderr_only()
            }
        }
    }

    pub fn with_max_level(mut self, level: LevelFilter) -> Self {
        self.max_level = level;
        self
    }

    fn spawn(session: Option<SessionFiles>, full: Option<File>, parsed: Option<File>) -> Self {
        let (tx, rx) = unbounded::<LogMessage>();

        // OS thread, not a tokio task: logging works from any runtime or none
        std::thread::spawn(move || {
            let mut full = full;
            let mut parsed_file = parsed;

            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        let formatted = format!("[{}] {}\n", line.timestamp, line.message);
                        if let Some(file) = full.as_mut() {
                            let _ = file.write_all(formatted.as_bytes());
                        }
                        if line.parsed {
                            if let Some(file) = parsed_file.as_mut() {
                                let _ = file.write_all(formatted.as_bytes());
                            }
                        }
                        if line.echo {
                            eprintln!("{}", line.message);
                        }
                    }
                    LogMessage::Flush(done) => {
                        for file in [full.as_mut(), parsed_file.as_mut()].into_iter().flatten() {
                            let _ = file.flush();
                            let _ = file.sync_data();
                        }
                        let _ = done.send(());
                    }
                }
            }
        });

        LogCollector {
            tx,
            session,
            max_level: LevelFilter::Info,
        }
    }

    /// Register as the global `log` backend.
    pub fn install(&self) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(self.clone()))?;
        log::set_max_level(self.max_level);
        Ok(())
    }

    pub fn session_files(&self) -> Option<&SessionFiles> {
        self.session.as_ref()
    }

    /// Send a log line (non-blocking). Cannot fail: the channel is unbounded.
    pub fn log_line(&self, line: LogLine) {
        let _ = self.tx.send(LogMessage::Line(line));
    }

    pub fn log_str(&self, message: impl Into<String>) {
        self.log_line(LogLine::new(message.into()));
    }

    pub fn log_parsed(&self, message: impl Into<String>) {
        self.log_line(LogLine::parsed(message.into()));
    }

    /// Wait until every line sent before this call has reached disk.
    ///
    /// Call before exiting so the final milestones are not lost.
    pub async fn wait_for_empty(&self) -> Result<(), String> {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        self.tx
            .send(LogMessage::Flush(tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        rx.recv()
            .map_err(|e| format!("Flush signal interrupted: {}", e))?;
        Ok(())
    }
}

/// Wires all log::info!(), log::warn!(), log::error!() calls into LogCollector
impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Target-aware routing: "parsed" marks high-level milestones
        if record.target() == "parsed" {
            self.log_parsed(format!("{}", record.args()));
            return;
        }
        let line = LogLine::new(format!("[{}] {}", record.level(), record.args()));
        if record.level() <= Level::Warn {
            self.log_line(line.echoed());
        } else {
            self.log_line(line);
        }
    }

    fn flush(&self) {}
}

fn open_append(path: &Path) -> Result<File, String> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))
}
