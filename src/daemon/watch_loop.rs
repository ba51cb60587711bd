//! The watch loop: fixed-cadence poll, classification, change detection,
//! and notification dispatch.
//!
//! Single worker alternating between an idle wait (interval elapsed or
//! cancellation, whichever first) and a non-preemptible poll cycle. Every
//! error inside a cycle is fatal: the loop returns it, the process exits,
//! and an external supervisor decides whether to restart. A cancellation is
//! only observed between cycles, so shutdown is bounded by at most one
//! in-flight network call.

use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick};

use crate::core::errors::Result;
use crate::daemon::notifications::{Notifier, update_message};
use crate::daemon::signals::ShutdownSignal;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::upstream::classify::{TestResult, classify};
use crate::upstream::client::StatusFetcher;

/// Fixed poll cadence. Not a configuration knob.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// The two opaque parameters identifying the watched test. Immutable for the
/// process lifetime.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    /// Retrieval code as handed out, possibly hyphenated.
    pub retrieval_code: String,
    /// Date of birth tied to the retrieval code.
    pub date_of_birth: String,
}

/// Holder for the single most-recently-observed classified result.
///
/// Owned exclusively by the watch loop; no locking needed. Starts at the
/// [`TestResult::Unseen`] sentinel and is never reset.
#[derive(Debug, Default)]
pub struct ResultStore {
    last: TestResult,
}

impl ResultStore {
    /// Create a store holding the unseen sentinel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last observed result.
    #[must_use]
    pub fn get(&self) -> TestResult {
        self.last
    }

    /// Record a newly observed result.
    pub fn set(&mut self, result: TestResult) {
        self.last = result;
    }
}

/// The watcher daemon: polls, classifies, compares, notifies.
pub struct WatchDaemon<F, N> {
    target: WatchTarget,
    chat_id: i64,
    fetcher: F,
    notifier: N,
    store: ResultStore,
    shutdown: ShutdownSignal,
    logger: ActivityLoggerHandle,
    interval: Duration,
    start_time: Instant,
}

impl<F: StatusFetcher, N: Notifier> WatchDaemon<F, N> {
    /// Build a daemon polling at the fixed [`POLL_INTERVAL`].
    pub fn new(
        target: WatchTarget,
        chat_id: i64,
        fetcher: F,
        notifier: N,
        shutdown: ShutdownSignal,
        logger: ActivityLoggerHandle,
    ) -> Self {
        Self {
            target,
            chat_id,
            fetcher,
            notifier,
            store: ResultStore::new(),
            shutdown,
            logger,
            interval: POLL_INTERVAL,
            start_time: Instant::now(),
        }
    }

    /// Override the poll cadence. Exists so tests can run at millisecond
    /// intervals; production callers keep [`POLL_INTERVAL`].
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The last observed result.
    #[must_use]
    pub fn last_result(&self) -> TestResult {
        self.store.get()
    }

    /// Run until cancellation (`Ok`) or the first fatal poll error (`Err`).
    ///
    /// This is the main entry point for `atw watch`.
    pub fn run(&mut self) -> Result<()> {
        self.logger.send(ActivityEvent::WatcherStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
        });
        eprintln!(
            "[ATW-WATCH] watching test status every {}s",
            self.interval.as_secs()
        );

        let outcome = self.watch();

        let uptime_secs = self.start_time.elapsed().as_secs();
        match &outcome {
            Ok(()) => {
                eprintln!("[ATW-WATCH] shutdown requested, stopping");
                self.logger.send(ActivityEvent::WatcherStopped {
                    reason: "shutdown signal".to_string(),
                    uptime_secs,
                });
            }
            Err(e) => {
                eprintln!("[ATW-WATCH] fatal: {e}");
                self.logger.send(ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
                self.logger.send(ActivityEvent::WatcherStopped {
                    reason: "fatal error".to_string(),
                    uptime_secs,
                });
            }
        }
        outcome
    }

    fn watch(&mut self) -> Result<()> {
        let ticker = tick(self.interval);
        let cancelled = self.shutdown.cancelled().clone();

        loop {
            // The one-shot wakeup message may already have been consumed by a
            // previous iteration; the flag stays authoritative.
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            select! {
                recv(cancelled) -> _ => return Ok(()),
                recv(ticker) -> _ => self.poll_once()?,
            }
        }
    }

    /// One poll cycle: fetch, classify, compare, notify, store. Not
    /// preemptible; any error aborts the loop.
    pub fn poll_once(&mut self) -> Result<()> {
        eprintln!("[ATW-WATCH] checking status of test");
        let raw = self
            .fetcher
            .fetch(&self.target.retrieval_code, &self.target.date_of_birth)?;
        let status = classify(&raw)?;

        let last = self.store.get();
        self.logger.send(ActivityEvent::StatusChecked {
            status: status.to_string(),
        });

        if status != last {
            self.notifier.send(self.chat_id, &update_message(status))?;
            eprintln!(
                "[ATW-WATCH] status {last} -> {status}, notified chat {}",
                self.chat_id
            );
            self.logger.send(ActivityEvent::StatusChanged {
                from: last.to_string(),
                to: status.to_string(),
            });
            self.logger.send(ActivityEvent::NotificationSent {
                chat_id: self.chat_id,
            });
        }

        // Updated unconditionally, but only after a successful cycle.
        self.store.set(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::AtwError;
    use crate::logger::activity::spawn_logger;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct ScriptedFetcher {
        responses: Mutex<Vec<Result<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<String>>) -> Self {
            let mut reversed = responses;
            reversed.reverse();
            Self {
                responses: Mutex::new(reversed),
                calls: AtomicUsize::new(0),
            }
        }

        fn repeating(body: &str) -> Self {
            Self {
                responses: Mutex::new(vec![Ok(body.to_string())]),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatusFetcher for &ScriptedFetcher {
        fn fetch(&self, _retrieval_code: &str, _date_of_birth: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() == 1 {
                // Last entry repeats forever.
                return responses[0]
                    .as_ref()
                    .map(Clone::clone)
                    .map_err(|e| AtwError::Runtime {
                        details: e.to_string(),
                    });
            }
            responses.pop().expect("script exhausted")
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, String)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn messages(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for &RecordingNotifier {
        fn send(&self, chat_id: i64, text: &str) -> Result<()> {
            if self.fail {
                return Err(AtwError::Notify {
                    details: "scripted failure".to_string(),
                });
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    struct Harness {
        shutdown: ShutdownSignal,
        logger: crate::logger::activity::ActivityLoggerHandle,
        logger_join: Option<thread::JoinHandle<()>>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn finish(mut self) {
            self.logger.shutdown();
            if let Some(join) = self.logger_join.take() {
                join.join().unwrap();
            }
        }
    }

    fn daemon<'a>(
        fetcher: &'a ScriptedFetcher,
        notifier: &'a RecordingNotifier,
    ) -> (WatchDaemon<&'a ScriptedFetcher, &'a RecordingNotifier>, Harness) {
        let dir = tempfile::tempdir().unwrap();
        let (logger, logger_join) = spawn_logger(dir.path().join("activity.jsonl")).unwrap();
        let shutdown = ShutdownSignal::manual();
        let daemon = WatchDaemon::new(
            WatchTarget {
                retrieval_code: "abc-123".to_string(),
                date_of_birth: "1990-01-02".to_string(),
            },
            42,
            fetcher,
            notifier,
            shutdown.clone(),
            logger.clone(),
        );
        let harness = Harness {
            shutdown,
            logger,
            logger_join: Some(logger_join),
            _dir: dir,
        };
        (daemon, harness)
    }

    #[test]
    fn store_starts_at_the_sentinel() {
        let store = ResultStore::new();
        assert_eq!(store.get(), TestResult::Unseen);
    }

    #[test]
    fn store_set_then_get() {
        let mut store = ResultStore::new();
        store.set(TestResult::Processing);
        assert_eq!(store.get(), TestResult::Processing);
    }

    #[test]
    fn first_real_classification_notifies() {
        let fetcher = ScriptedFetcher::repeating("Test processing.");
        let notifier = RecordingNotifier::default();
        let (mut d, harness) = daemon(&fetcher, &notifier);

        d.poll_once().unwrap();

        let sent = notifier.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
        assert_eq!(sent[0].1, "Test status has been updated: processing");
        assert_eq!(d.last_result(), TestResult::Processing);
        harness.finish();
    }

    #[test]
    fn repeated_status_never_notifies_twice() {
        let fetcher = ScriptedFetcher::repeating("Test processing.");
        let notifier = RecordingNotifier::default();
        let (mut d, harness) = daemon(&fetcher, &notifier);

        for _ in 0..5 {
            d.poll_once().unwrap();
        }

        assert_eq!(notifier.messages().len(), 1);
        harness.finish();
    }

    #[test]
    fn scenario_processing_processing_done() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok("Test processing.".to_string()),
            Ok("Test processing.".to_string()),
            Ok("done".to_string()),
        ]);
        let notifier = RecordingNotifier::default();
        let (mut d, harness) = daemon(&fetcher, &notifier);

        d.poll_once().unwrap();
        assert_eq!(notifier.messages().len(), 1);

        d.poll_once().unwrap();
        assert_eq!(notifier.messages().len(), 1);

        d.poll_once().unwrap();
        let sent = notifier.messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1, "Test status has been updated: changed");
        assert_eq!(d.last_result(), TestResult::Changed);
        harness.finish();
    }

    #[test]
    fn invalid_input_is_fatal_and_sends_nothing() {
        let fetcher =
            ScriptedFetcher::repeating("Cannot read property 'email' of undefined");
        let notifier = RecordingNotifier::default();
        let (mut d, harness) = daemon(&fetcher, &notifier);

        let err = d.poll_once().expect_err("expected invalid input");
        assert_eq!(err.code(), "ATW-2002");
        assert!(notifier.messages().is_empty());
        assert_eq!(d.last_result(), TestResult::Unseen);
        harness.finish();
    }

    #[test]
    fn transport_failure_is_fatal() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(AtwError::Transport {
                details: "connection refused".to_string(),
            }),
            Err(AtwError::Transport {
                details: "connection refused".to_string(),
            }),
        ]);
        let notifier = RecordingNotifier::default();
        let (mut d, harness) = daemon(&fetcher, &notifier);

        let err = d.poll_once().expect_err("expected transport failure");
        assert_eq!(err.code(), "ATW-2001");
        assert!(notifier.messages().is_empty());
        harness.finish();
    }

    #[test]
    fn notify_failure_leaves_store_untouched() {
        let fetcher = ScriptedFetcher::repeating("Test processing.");
        let notifier = RecordingNotifier::failing();
        let (mut d, harness) = daemon(&fetcher, &notifier);

        let err = d.poll_once().expect_err("expected notify failure");
        assert_eq!(err.code(), "ATW-2101");
        // Store is only updated after a fully successful cycle, so the next
        // attempt would re-notify rather than silently swallow the change.
        assert_eq!(d.last_result(), TestResult::Unseen);
        harness.finish();
    }

    #[test]
    fn cancellation_before_first_tick_polls_nothing() {
        let fetcher = ScriptedFetcher::repeating("Test processing.");
        let notifier = RecordingNotifier::default();
        let (d, harness) = daemon(&fetcher, &notifier);
        let mut d = d.with_interval(Duration::from_millis(5));

        harness.shutdown.request_shutdown();
        let outcome = d.run();

        assert!(outcome.is_ok());
        assert_eq!(fetcher.call_count(), 0);
        assert!(notifier.messages().is_empty());
        harness.finish();
    }

    #[test]
    fn run_polls_until_cancelled() {
        let fetcher = ScriptedFetcher::repeating("Test processing.");
        let notifier = RecordingNotifier::default();
        let (d, harness) = daemon(&fetcher, &notifier);
        let mut d = d.with_interval(Duration::from_millis(2));

        let shutdown = harness.shutdown.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            shutdown.request_shutdown();
        });

        let outcome = d.run();
        canceller.join().unwrap();

        assert!(outcome.is_ok());
        assert!(fetcher.call_count() >= 1, "at least one poll should run");
        assert_eq!(notifier.messages().len(), 1);
        harness.finish();
    }

    #[test]
    fn run_surfaces_fatal_error_from_cycle() {
        let fetcher =
            ScriptedFetcher::repeating("Cannot read property 'email' of undefined");
        let notifier = RecordingNotifier::default();
        let (d, harness) = daemon(&fetcher, &notifier);
        let mut d = d.with_interval(Duration::from_millis(2));

        let err = d.run().expect_err("expected fatal run");
        assert_eq!(err.code(), "ATW-2002");
        assert_eq!(fetcher.call_count(), 1, "no retry after a fatal error");
        assert!(notifier.messages().is_empty());
        harness.finish();
    }
}
