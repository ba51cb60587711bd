#![forbid(unsafe_code)]

//! Altius Test Watcher (atw) — polls the Altius test-report endpoint on a
//! fixed interval and sends a Telegram message when the classified result
//! changes.
//!
//! The watcher is deliberately simple: one worker, one poll at a time, no
//! retries. Any failure inside a poll cycle is fatal and the process exits
//! with code 1, leaving restarts to an external supervisor.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use altius_test_watcher::prelude::*;
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod logger;
pub mod upstream;
