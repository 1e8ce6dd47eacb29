//! Rate-limited error logging
//!
//! A drain that keeps failing against a broken target would otherwise log
//! on every submission. This logger emits at most one entry per interval
//! and reports how many it held back in between.
//!
//! # Example
//!
//! ```ignore
//! use spool_sinks::util::RateLimitedLogger;
//! use std::time::Duration;
//!
//! let logger = RateLimitedLogger::new("audit", Duration::from_secs(10));
//!
//! // Only logs once per 10 seconds, even if called frequently
//! for _ in 0..1000 {
//!     logger.error("drain stopped", &io_error);
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval for rate-limited logging
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Logger that suppresses repeats within an interval
///
/// Thread-safe: atomic counters plus a mutex around the last log time.
#[derive(Debug)]
pub struct RateLimitedLogger {
    /// Sink name attached to every entry
    sink: String,

    /// Minimum interval between entries
    min_interval: Duration,

    last_log_time: Mutex<Option<Instant>>,

    /// Errors since the last entry
    error_count: AtomicU64,

    total_errors: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(sink: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            sink: sink.into(),
            min_interval,
            last_log_time: Mutex::new(None),
            error_count: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    /// Record an error and log it unless one was logged within the interval
    ///
    /// Returns true if the error was logged, false if it was suppressed.
    pub fn error(&self, message: &str, error: &dyn std::fmt::Display) -> bool {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        let total = self.total_errors.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.interval_elapsed() {
            return false;
        }

        let count = self.error_count.swap(0, Ordering::Relaxed);
        if count > 1 {
            tracing::error!(
                sink = %self.sink,
                error = %error,
                suppressed_count = count - 1,
                total_errors = total,
                "{message} (rate-limited)"
            );
        } else {
            tracing::error!(
                sink = %self.sink,
                error = %error,
                total_errors = total,
                "{message}"
            );
        }
        true
    }

    fn interval_elapsed(&self) -> bool {
        let mut last_time = self.last_log_time.lock();
        let now = Instant::now();

        match *last_time {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                *last_time = Some(now);
                true
            }
        }
    }

    /// Errors recorded since the last emitted entry
    pub fn pending_error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn total_error_count(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }
}
