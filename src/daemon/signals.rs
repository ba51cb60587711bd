//! Signal handling: SIGTERM/SIGINT graceful shutdown.
//!
//! Uses the `signal-hook` crate for safe signal registration. A dedicated
//! listener thread forwards the first signal into a one-shot channel so the
//! watch loop can block on "interval elapsed or cancellation", whichever
//! comes first, instead of polling a flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::core::errors::{AtwError, Result};

/// One-shot cancellation signal shared between the signal listener and the
/// watch loop.
///
/// Triggering is idempotent: only the first trigger flips the flag and wakes
/// the channel; later signals (or repeated programmatic requests) are
/// swallowed without panicking or double-closing anything.
#[derive(Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl ShutdownSignal {
    /// Create a signal with no OS hooks attached. Cancellation can only be
    /// requested programmatically; this is the constructor tests use.
    #[must_use]
    pub fn manual() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    /// Create a signal and register OS hooks for SIGINT and SIGTERM.
    ///
    /// The listener thread stays alive for the process lifetime so repeated
    /// signals keep being swallowed rather than falling back to the default
    /// disposition.
    pub fn install() -> Result<Self> {
        let signal = Self::manual();

        let mut signals =
            Signals::new([SIGINT, SIGTERM]).map_err(|source| AtwError::Runtime {
                details: format!("failed to register signal handlers: {source}"),
            })?;

        let listener = signal.clone();
        thread::Builder::new()
            .name("atw-signals".to_string())
            .spawn(move || {
                for signal_number in signals.forever() {
                    if !listener.flag.swap(true, Ordering::SeqCst) {
                        eprintln!("[ATW-SIGNAL] received signal {signal_number}, shutting down");
                        let _ = listener.tx.try_send(());
                    }
                }
            })
            .map_err(|source| AtwError::Runtime {
                details: format!("failed to spawn signal listener: {source}"),
            })?;

        Ok(signal)
    }

    /// Request cancellation programmatically. Safe to call more than once.
    pub fn request_shutdown(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            let _ = self.tx.try_send(());
        }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Channel that delivers exactly one message on the first cancellation.
    #[must_use]
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.rx
    }
}
