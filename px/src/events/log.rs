//! Execution log
//!
//! Timestamped run events. Each entry is kept in memory for the run report,
//! echoed to stdout, mirrored to tracing, and optionally appended to a JSONL
//! audit file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Severity of an execution log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

/// A single execution log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

/// Shared, thread-safe execution log
pub struct ExecutionLog {
    entries: Mutex<Vec<LogEntry>>,
    sink: Option<Mutex<BufWriter<File>>>,
    sink_path: Option<PathBuf>,
    echo: bool,
    quiet: bool,
}

impl ExecutionLog {
    /// Create a log that echoes entries to stdout
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sink: None,
            sink_path: None,
            echo: true,
            quiet: false,
        }
    }

    /// Create a log that only records (for tests and embedding)
    pub fn silent() -> Self {
        Self {
            echo: false,
            ..Self::new()
        }
    }

    /// Suppress everything but errors on stdout
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Append every entry as a JSON line to `<dir>/<plan>.jsonl`
    pub fn with_jsonl_sink(mut self, dir: impl AsRef<Path>, plan: &str) -> eyre::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.jsonl", plan));
        debug!(?path, "ExecutionLog::with_jsonl_sink: opening sink");

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.sink = Some(Mutex::new(BufWriter::new(file)));
        self.sink_path = Some(path);
        Ok(self)
    }

    /// Path of the JSONL sink, if enabled
    pub fn sink_path(&self) -> Option<&Path> {
        self.sink_path.as_deref()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.record(LogLevel::Success, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(LogLevel::Error, message.into());
    }

    /// Verbose progress line: printed unless quiet, never recorded
    pub fn detail(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        debug!(%message, "ExecutionLog::detail");
        if self.echo && !self.quiet {
            println!("{}", message);
        }
    }

    /// Snapshot of all recorded entries
    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).clone()
    }

    /// Recorded entries at the given level
    pub fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
        lock(&self.entries).iter().filter(|e| e.level == level).cloned().collect()
    }

    fn record(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info | LogLevel::Success => info!(?level, "{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }

        if self.echo && (!self.quiet || level == LogLevel::Error) {
            let tag = match level {
                LogLevel::Info => "[INFO]".cyan(),
                LogLevel::Success => "[OK]".green(),
                LogLevel::Warn => "[WARN]".yellow(),
                LogLevel::Error => "[ERROR]".red(),
            };
            println!("{} {}", tag, message);
        }

        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            message,
        };

        if let Some(sink) = &self.sink
            && let Err(e) = append_jsonl(&mut lock(sink), &entry)
        {
            error!(error = %e, "ExecutionLog: failed to write JSONL entry");
        }

        lock(&self.entries).push(entry);
    }
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Read entries back from a JSONL execution log
pub fn read_execution_log(path: impl AsRef<Path>) -> eyre::Result<Vec<LogEntry>> {
    let path = path.as_ref();
    debug!(?path, "read_execution_log: reading log file");

    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(error = %e, "read_execution_log: skipping malformed line"),
        }
    }
    Ok(entries)
}

fn append_jsonl(writer: &mut BufWriter<File>, entry: &LogEntry) -> std::io::Result<()> {
    let json = serde_json::to_string(entry)?;
    writeln!(writer, "{}", json)?;
    writer.flush()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
