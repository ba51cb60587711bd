//! Activity logger thread: owns the JSONL writer, fed over a bounded channel.
//!
//! All other threads send [`ActivityEvent`] via non-blocking `try_send()` so
//! the watch loop is never blocked by logging back-pressure.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{AtwError, Result};
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 256;

// ──────────────────── public event type ────────────────────

/// Events that can be logged through the activity logger.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    WatcherStarted {
        version: String,
    },
    WatcherStopped {
        reason: String,
        uptime_secs: u64,
    },
    StatusChecked {
        status: String,
    },
    StatusChanged {
        from: String,
        to: String,
    },
    NotificationSent {
        chat_id: i64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Non-blocking.
    ///
    /// If the channel is full the event is dropped and the dropped-events
    /// counter is incremented.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events dropped due to back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the logger thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle.
///
/// The logger runs until `handle.shutdown()` is called or all senders are
/// dropped.
pub fn spawn_logger(jsonl_path: PathBuf) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("atw-logger".to_string())
        .spawn(move || {
            logger_thread_main(&rx, jsonl_path, &dropped_clone);
        })
        .map_err(|e| AtwError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(rx: &Receiver<ActivityEvent>, jsonl_path: PathBuf, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(jsonl_path);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            jsonl.flush();
            break;
        }

        jsonl.write_entry(&event_to_log_entry(&event));
    }
    jsonl.flush();
}

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::WatcherStarted { version } => {
            let mut e = LogEntry::new(EventType::WatcherStart, Severity::Info);
            e.details = Some(format!("atw v{version}"));
            e
        }
        ActivityEvent::WatcherStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new(EventType::WatcherStop, Severity::Info);
            e.details = Some(format!("{reason} (uptime={uptime_secs}s)"));
            e
        }
        ActivityEvent::StatusChecked { status } => {
            let mut e = LogEntry::new(EventType::StatusCheck, Severity::Info);
            e.status = Some(status.clone());
            e
        }
        ActivityEvent::StatusChanged { from, to } => {
            let mut e = LogEntry::new(EventType::StatusChange, Severity::Info);
            e.last_status = Some(from.clone());
            e.status = Some(to.clone());
            e
        }
        ActivityEvent::NotificationSent { chat_id } => {
            let mut e = LogEntry::new(EventType::NotificationSend, Severity::Info);
            e.chat_id = Some(*chat_id);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::WatcherStop, Severity::Info),
    }
}
