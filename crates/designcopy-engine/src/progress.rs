//! Progress and log plumbing.
//!
//! Every caller-visible line goes three ways: to `tracing`, to the caller's
//! [`ProgressSink`], and into the run log returned with the result.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::models::{LogEntry, Severity};

/// Caller-supplied progress and log callbacks.
pub trait ProgressSink: Send + Sync {
    /// Report overall progress (0-100) and the current action.
    fn progress(&self, percent: u8, message: &str);

    /// Report a log line.
    fn log(&self, message: &str, severity: Severity);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&self, _percent: u8, _message: &str) {}

    fn log(&self, _message: &str, _severity: Severity) {}
}

/// Sink built from two closures.
pub struct CallbackProgress<P, L> {
    on_progress: P,
    on_log: L,
}

impl<P, L> CallbackProgress<P, L>
where
    P: Fn(u8, &str) + Send + Sync,
    L: Fn(&str, Severity) + Send + Sync,
{
    /// Wrap the two callbacks.
    pub fn new(on_progress: P, on_log: L) -> Self {
        Self {
            on_progress,
            on_log,
        }
    }
}

impl<P, L> ProgressSink for CallbackProgress<P, L>
where
    P: Fn(u8, &str) + Send + Sync,
    L: Fn(&str, Severity) + Send + Sync,
{
    fn progress(&self, percent: u8, message: &str) {
        (self.on_progress)(percent, message);
    }

    fn log(&self, message: &str, severity: Severity) {
        (self.on_log)(message, severity);
    }
}

/// Keeps reported progress monotonic and within 0-100.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgressTracker {
    current: u8,
}

impl ProgressTracker {
    /// Advance to `percent`; never moves backwards.
    pub fn advance(&mut self, percent: u8) -> u8 {
        self.current = self.current.max(percent.min(100));
        self.current
    }

    /// Current percentage.
    pub fn current(&self) -> u8 {
        self.current
    }

    /// Linear position of `done / total` inside `[start, end]`.
    pub fn within(start: u8, end: u8, done: usize, total: usize) -> u8 {
        if total == 0 || end <= start {
            return start;
        }
        let span = usize::from(end - start);
        let offset = span * done.min(total) / total;
        start + offset as u8
    }
}

/// Collects the run log and forwards it to the caller.
pub struct RunReporter<'a> {
    sink: &'a dyn ProgressSink,
    tracker: ProgressTracker,
    entries: Vec<LogEntry>,
    warnings: Vec<String>,
}

impl<'a> RunReporter<'a> {
    /// Create a reporter over a sink.
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            tracker: ProgressTracker::default(),
            entries: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Report progress.
    pub fn progress(&mut self, percent: u8, message: &str) {
        let percent = self.tracker.advance(percent);
        debug!(percent, action = message, "Progress");
        self.sink.progress(percent, message);
    }

    /// Report progress for item `done` of `total` within a range.
    pub fn progress_within(&mut self, start: u8, end: u8, done: usize, total: usize, message: &str) {
        self.progress(ProgressTracker::within(start, end, done, total), message);
    }

    /// Current percentage.
    pub fn percent(&self) -> u8 {
        self.tracker.current()
    }

    /// Record a log line.
    pub fn log(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Debug => debug!(%severity, "{message}"),
            Severity::Info | Severity::Success => info!(%severity, "{message}"),
            Severity::Warning => warn!(%severity, "{message}"),
            Severity::Error => error!(%severity, "{message}"),
        }
        if severity == Severity::Warning {
            self.warnings.push(message.clone());
        }
        self.sink.log(&message, severity);
        self.entries.push(LogEntry {
            at: Utc::now(),
            severity,
            message,
        });
    }

    /// Debug line.
    pub fn debug(&mut self, message: impl Into<String>) {
        self.log(Severity::Debug, message);
    }

    /// Info line.
    pub fn info(&mut self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    /// Success line.
    pub fn success(&mut self, message: impl Into<String>) {
        self.log(Severity::Success, message);
    }

    /// Warning line; also collected into the warning list.
    pub fn warning(&mut self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    /// Error line.
    pub fn error(&mut self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Consume the reporter into `(log, warnings)`.
    pub fn into_parts(self) -> (Vec<LogEntry>, Vec<String>) {
        (self.entries, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_tracker_is_monotonic() {
        let mut t = ProgressTracker::default();
        assert_eq!(t.advance(15), 15);
        assert_eq!(t.advance(10), 15);
        assert_eq!(t.advance(200), 100);
    }

    #[test]
    fn test_within_range() {
        assert_eq!(ProgressTracker::within(15, 70, 0, 10), 15);
        assert_eq!(ProgressTracker::within(15, 70, 5, 10), 42);
        assert_eq!(ProgressTracker::within(15, 70, 10, 10), 70);
        assert_eq!(ProgressTracker::within(15, 70, 3, 0), 15);
    }

    #[test]
    fn test_reporter_forwards_and_collects() {
        let seen = Mutex::new(Vec::new());
        let logs = Mutex::new(Vec::new());
        let sink = CallbackProgress::new(
            |p, _m: &str| seen.lock().expect("lock").push(p),
            |m: &str, s| logs.lock().expect("lock").push((m.to_string(), s)),
        );

        let mut reporter = RunReporter::new(&sink);
        reporter.progress(20, "a");
        reporter.progress(5, "b");
        reporter.warning("careful");
        reporter.success("done");

        assert_eq!(*seen.lock().expect("lock"), vec![20, 20]);
        assert_eq!(logs.lock().expect("lock").len(), 2);

        let (log, warnings) = reporter.into_parts();
        assert_eq!(log.len(), 2);
        assert_eq!(warnings, vec!["careful".to_string()]);
    }
}
