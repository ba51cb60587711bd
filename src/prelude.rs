//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use altius_test_watcher::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{AtwError, Result};

// Upstream
pub use crate::upstream::classify::{TestResult, classify};
pub use crate::upstream::client::{HttpStatusClient, StatusFetcher};

// Daemon
pub use crate::daemon::notifications::{Notifier, TelegramNotifier};
pub use crate::daemon::signals::ShutdownSignal;
pub use crate::daemon::watch_loop::{POLL_INTERVAL, ResultStore, WatchDaemon, WatchTarget};
