//! Spool - Sinks
//!
//! Ordered, append-only persistence of items submitted from many threads.
//! Every item is mapped to a line and written to one backing target, one at
//! a time, each line flushed before the next starts.
//!
//! # Architecture
//!
//! ```text
//! [producers] --write()--> [Sink] --ItemMapper--> [line] --AppendWrite--> [AppendTarget]
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Who writes | Producer cost |
//! |------|------------|---------------|
//! | [`LineSink`] | whichever producer finds it idle | enqueue, sometimes a drain |
//! | [`BackgroundSink`] | a dedicated blocking task | one channel send |
//!
//! # Targets
//!
//! | Target | Purpose |
//! |--------|---------|
//! | [`FileTarget`] | Buffered file, truncated or appended on first open |
//! | [`MemoryTarget`] | In-memory contents with fault injection, for tests |
//!
//! # Example
//!
//! ```
//! use spool_sinks::{DisplayMapper, LineSink, MemoryTarget, SinkError};
//!
//! let target = MemoryTarget::new();
//! let sink = LineSink::new(DisplayMapper, target.clone())?;
//!
//! sink.write_batch(["a", "b", "c"])?;
//! sink.close();
//! assert_eq!(target.contents_string(), "abc");
//!
//! assert!(matches!(sink.write("d"), Err(SinkError::Closed)));
//! # Ok::<(), SinkError>(())
//! ```

// =============================================================================
// Sinks
// =============================================================================

/// Line sink - producers take turns draining
pub mod line_sink;

/// Background sink - a dedicated writer task drains
pub mod background;

// =============================================================================
// Building blocks
// =============================================================================

/// Item to line conversion
pub mod mapper;

/// Backing destinations
pub mod target;

/// Shared utilities (rate-limited logging)
pub mod util;

mod common;
mod drain;

pub use background::BackgroundSink;
pub use common::{
    DEFAULT_RETRY_DELAY, DEFAULT_WRITE_RETRIES, LineSinkConfig, MapFailurePolicy,
    MetricsSnapshot, Result, SinkError, SinkMetrics,
};
pub use line_sink::LineSink;
pub use mapper::{BoxError, DisplayMapper, ItemMapper, JsonLinesMapper, LineMapper, MapError};
pub use target::{AppendTarget, AppendWrite, FileTarget, MemoryTarget, WriteMode};
