//! JSONL log writer: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object, assembled in memory and written
//! with a single `write` so tailing processes never see partial lines.
//!
//! Degradation chain when the file cannot be written:
//! 1. Primary file path
//! 2. stderr with `[ATW-JSONL]` prefix
//! 3. Silent discard (the watcher must never crash for logging failures)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AtwError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Event types matching the atw activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WatcherStart,
    WatcherStop,
    StatusCheck,
    StatusChange,
    NotificationSend,
    Error,
}

/// A single JSONL entry — all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: EventType,
    /// Severity level.
    pub severity: Severity,
    /// Classified status observed this cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Previously observed status (on change events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    /// Destination chat for notification events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    /// ATW error code if the event records a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            status: None,
            last_status: None,
            chat_id: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with stderr fallback.
///
/// At one event per poll interval there is nothing worth buffering or
/// rotating; every entry is flushed as it is written.
pub struct JsonlWriter {
    path: PathBuf,
    file: Option<File>,
    state: WriterState,
}

impl JsonlWriter {
    /// Open the JSONL log file, degrading to stderr on failure.
    pub fn open(path: PathBuf) -> Self {
        match open_append(&path) {
            Ok(file) => Self {
                path,
                file: Some(file),
                state: WriterState::Normal,
            },
            Err(e) => {
                let _ = writeln!(
                    io::stderr(),
                    "[ATW-JSONL] cannot open {}: {e}; using stderr",
                    path.display()
                );
                Self {
                    path,
                    file: None,
                    state: WriterState::Stderr,
                }
            }
        }
    }

    /// Write a single entry as one atomic JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[ATW-JSONL] serialize error: {e}");
                return;
            }
        };

        self.write_line(&line);
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                let failed = self
                    .file
                    .as_mut()
                    .is_none_or(|f| f.write_all(line.as_bytes()).is_err());
                if failed {
                    self.file = None;
                    self.state = WriterState::Stderr;
                    let _ = writeln!(
                        io::stderr(),
                        "[ATW-JSONL] write to {} failed, using stderr",
                        self.path.display()
                    );
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[ATW-JSONL] {line}").is_err() {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Discard => {}
        }
    }

    /// Flush pending data to disk.
    pub fn flush(&mut self) {
        if let Some(f) = self.file.as_mut() {
            let _ = f.sync_data();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }
}

/// Open or create a file for appending.
fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AtwError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| AtwError::io(path, source))
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
