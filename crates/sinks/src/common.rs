//! Common types shared by the line sinks
//!
//! Errors, metrics, and configuration used by both the opportunistic
//! [`LineSink`](crate::LineSink) and the [`BackgroundSink`](crate::BackgroundSink).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::mapper::MapError;
use crate::util::DEFAULT_LOG_INTERVAL;

/// Default write retry attempts for the background writer
pub const DEFAULT_WRITE_RETRIES: usize = 3;

/// Default delay between background write retries
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Result type for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// What the drain does with an item whose mapping fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MapFailurePolicy {
    /// Log and count the item, then continue with the next one
    #[default]
    Skip,
    /// Keep the item at the head of the queue and stop the drain until the
    /// mapper accepts it
    Retain,
}

/// Configuration shared by the line sinks
#[derive(Debug, Clone)]
pub struct LineSinkConfig {
    /// Sink name used in logs
    pub name: String,

    /// Handling of mapping failures
    pub map_failure: MapFailurePolicy,

    /// Minimum interval between repeated drain error logs
    pub error_log_interval: Duration,

    /// Write attempts per round in the background writer
    pub max_write_retries: usize,

    /// Delay between background write attempts
    pub retry_delay: Duration,
}

impl Default for LineSinkConfig {
    fn default() -> Self {
        Self {
            name: "line_sink".into(),
            map_failure: MapFailurePolicy::Skip,
            error_log_interval: DEFAULT_LOG_INTERVAL,
            max_write_retries: DEFAULT_WRITE_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl LineSinkConfig {
    /// Set the sink name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the mapping failure policy
    #[must_use]
    pub fn with_map_failure(mut self, policy: MapFailurePolicy) -> Self {
        self.map_failure = policy;
        self
    }

    /// Set the interval between repeated error logs
    #[must_use]
    pub fn with_error_log_interval(mut self, interval: Duration) -> Self {
        self.error_log_interval = interval;
        self
    }

    /// Set background retry attempts and delay
    ///
    /// `max_write_retries` is clamped to at least one attempt.
    #[must_use]
    pub fn with_retries(mut self, max_write_retries: usize, retry_delay: Duration) -> Self {
        self.max_write_retries = max_write_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }
}

/// Counters shared by the line sinks
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Items accepted by a submission call
    pub items_received: AtomicU64,

    /// Items persisted (appended and flushed)
    pub items_written: AtomicU64,

    /// Bytes persisted
    pub bytes_written: AtomicU64,

    /// Append or flush failures
    pub write_errors: AtomicU64,

    /// Mapping failures
    pub map_errors: AtomicU64,

    /// Items skipped under [`MapFailurePolicy::Skip`]
    pub items_skipped: AtomicU64,

    /// Items abandoned by a background writer at close
    pub items_dropped: AtomicU64,

    /// Successful flushes
    pub flush_count: AtomicU64,

    /// Drain passes started
    pub drains: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            items_received: AtomicU64::new(0),
            items_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            map_errors: AtomicU64::new(0),
            items_skipped: AtomicU64::new(0),
            items_dropped: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
            drains: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self, items: u64) {
        self.items_received.fetch_add(items, Ordering::Relaxed);
    }

    /// Record a persisted item of `bytes` length
    #[inline]
    pub fn record_written(&self, bytes: u64) {
        self.items_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_map_error(&self) {
        self.map_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.items_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self, items: u64) {
        self.items_dropped.fetch_add(items, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_drain(&self) {
        self.drains.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_received: self.items_received.load(Ordering::Relaxed),
            items_written: self.items_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            map_errors: self.map_errors.load(Ordering::Relaxed),
            items_skipped: self.items_skipped.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub items_received: u64,
    pub items_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
    pub map_errors: u64,
    pub items_skipped: u64,
    pub items_dropped: u64,
    pub flush_count: u64,
    pub drains: u64,
}

/// Sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink could not be set up
    #[error("failed to initialize sink: {0}")]
    Init(String),

    /// Opening the backing target failed
    #[error("failed to open {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Append, flush, or close failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink is closed
    #[error("sink is closed")]
    Closed,

    /// The item mapper failed
    #[error("mapping failed: {0}")]
    Map(#[from] MapError),
}

impl SinkError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create an open error for the described target
    pub fn open(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Open {
            target: target.into(),
            source,
        }
    }

    /// Whether this error belongs to the I/O class (open, append, flush, close)
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Io(_))
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod common_test;
