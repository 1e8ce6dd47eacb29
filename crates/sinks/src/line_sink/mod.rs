//! Line Sink - Ordered append-only persistence driven by its producers
//!
//! Any number of threads submit items; every item is mapped to a line and
//! appended to one backing target, one at a time, flushed after each line.
//! There is no writer thread. Whichever producer finds the sink idle drains
//! the queue itself, and everyone else just enqueues and returns.
//!
//! # Architecture
//!
//! ```text
//! [write()] --push--> [SegQueue] --try_lock--> [drain: map -> append -> flush] --> [Target]
//!                                     |
//!                                     +-- busy: return immediately, the drainer
//!                                         (or the next producer) picks it up
//! ```
//!
//! # Guarantees
//!
//! - **One writer**: the drain runs under a mutex; at most one thread appends
//! - **Non-blocking producers**: a busy drain is skipped with `try_lock`
//! - **FIFO persistence**: items are written in dequeue order; a single
//!   producer's items land in submission order
//! - **No loss on write failure**: a failed item keeps its place at the head
//!   and the next drain (any producer, `flush()`, or `open()`) retries it
//! - **No stuck flag**: the drain flag is the mutex guard, released on every exit
//!
//! A successful `write` does not mean the item is persisted: the call may
//! return while another thread is still draining. Use [`LineSink::flush`]
//! for an explicit persistence point.
//!
//! # Example
//!
//! ```
//! use spool_sinks::{DisplayMapper, LineSink, MemoryTarget};
//!
//! let target = MemoryTarget::new();
//! let sink = LineSink::new(DisplayMapper, target.clone())?;
//!
//! sink.write("a")?;
//! sink.write_batch(["b", "c"])?;
//! sink.close();
//!
//! assert_eq!(target.contents_string(), "abc");
//! # Ok::<(), spool_sinks::SinkError>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::SegQueue;
use parking_lot::Mutex;

use crate::common::{LineSinkConfig, MetricsSnapshot, Result, SinkError, SinkMetrics};
use crate::drain::{DrainCore, Persisted};
use crate::mapper::ItemMapper;
use crate::target::{AppendTarget, FileTarget};
use crate::util::RateLimitedLogger;

/// Thread-safe ordered sink with an opportunistic single writer
pub struct LineSink<T> {
    /// Sink name for logging
    name: String,

    /// Submitted items not yet handed to the drain
    queue: SegQueue<T>,

    /// Drain state; holding the lock is holding the writer role
    core: Mutex<DrainCore<T>>,

    /// Whether a handle is open; readable without the lock
    open: AtomicBool,

    /// Set while a thread is inside the drain loop
    draining: AtomicBool,

    metrics: Arc<SinkMetrics>,

    /// Rate-limited logger for drain failures
    error_logger: RateLimitedLogger,
}

impl<T> LineSink<T> {
    /// Create a sink over `target` and open it
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] if the target cannot be opened.
    pub fn new<M, A>(mapper: M, target: A) -> Result<Self>
    where
        M: ItemMapper<T> + 'static,
        A: AppendTarget + 'static,
    {
        Self::with_config(LineSinkConfig::default(), mapper, target)
    }

    /// Create a sink writing to a file at `path` (truncated on open)
    pub fn file<M>(mapper: M, path: impl Into<PathBuf>) -> Result<Self>
    where
        M: ItemMapper<T> + 'static,
    {
        Self::new(mapper, FileTarget::new(path))
    }

    /// Create a sink with explicit configuration and open it
    pub fn with_config<M, A>(config: LineSinkConfig, mapper: M, target: A) -> Result<Self>
    where
        M: ItemMapper<T> + 'static,
        A: AppendTarget + 'static,
    {
        let metrics = Arc::new(SinkMetrics::new());
        let core = DrainCore::new(
            Box::new(mapper),
            Arc::new(target),
            config.map_failure,
            Arc::clone(&metrics),
        );

        let sink = Self {
            error_logger: RateLimitedLogger::new(config.name.clone(), config.error_log_interval),
            name: config.name,
            queue: SegQueue::new(),
            core: Mutex::new(core),
            open: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            metrics,
        };
        sink.open()?;
        Ok(sink)
    }

    /// Submit one item
    ///
    /// The item is enqueued, then drained by this thread if no other thread
    /// is draining. Drain failures are logged and leave the item queued;
    /// they are not returned here.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] if the sink is closed. Nothing is
    /// enqueued in that case.
    pub fn write(&self, item: T) -> Result<()> {
        self.ensure_open()?;
        self.queue.push(item);
        self.metrics.record_received(1);
        self.try_drain();
        Ok(())
    }

    /// Submit several items, returning how many were enqueued
    ///
    /// Items are enqueued in iteration order before the drain attempt.
    /// Accepts arrays, slices (by clone), vectors, and any other iterator.
    pub fn write_batch<I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
    {
        self.ensure_open()?;
        let mut count = 0usize;
        for item in items {
            self.queue.push(item);
            count += 1;
        }
        self.metrics.record_received(count as u64);
        self.try_drain();
        Ok(count)
    }

    /// Drain the backlog, waiting for any in-progress drain first
    ///
    /// Returns the number of items persisted by this call.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] on a closed sink, or the failure that
    /// stopped the drain. The failed item stays at the head of the queue.
    pub fn flush(&self) -> Result<usize> {
        self.ensure_open()?;
        let mut core = self.core.lock();
        self.drain_locked(&mut core)
    }

    /// Open the backing target
    ///
    /// A no-op with a warning if the sink is already open. After reopening,
    /// any backlog left from before a close is drained.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] if the target cannot be opened.
    pub fn open(&self) -> Result<()> {
        let mut core = self.core.lock();
        if core.is_attached() {
            tracing::warn!(sink = %self.name, "sink already open");
            return Ok(());
        }

        if let Err(e) = core.attach() {
            tracing::error!(sink = %self.name, error = %e, "failed to open sink");
            return Err(e);
        }
        self.open.store(true, Ordering::Release);
        tracing::debug!(sink = %self.name, target = %core.describe_target(), "sink opened");

        if (core.has_stalled() || !self.queue.is_empty())
            && let Err(e) = self.drain_locked(&mut core)
        {
            self.error_logger.error("backlog drain after open stopped", &e);
        }
        Ok(())
    }

    /// Close the backing target
    ///
    /// Makes one final attempt to drain the backlog, then releases the
    /// handle. Failures are logged, not returned. Items still pending stay
    /// queued and are drained if the sink is reopened.
    pub fn close(&self) -> MetricsSnapshot {
        let mut core = self.core.lock();
        if !core.is_attached() {
            tracing::debug!(sink = %self.name, "sink already closed");
            return self.metrics.snapshot();
        }

        if let Err(e) = self.drain_locked(&mut core) {
            tracing::warn!(sink = %self.name, error = %e, "final drain incomplete");
        }

        self.open.store(false, Ordering::Release);
        let bytes = match core.detach() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(sink = %self.name, error = %e, "failed to release target");
                0
            }
        };

        let pending = self.queue.len() + usize::from(core.has_stalled());
        drop(core);

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            sink = %self.name,
            items_written = snapshot.items_written,
            bytes,
            write_errors = snapshot.write_errors,
            pending,
            "sink closed"
        );
        snapshot
    }

    /// Whether the sink has an open handle
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Whether a thread is currently draining
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Items submitted but not yet persisted
    ///
    /// Waits for an in-progress drain to finish.
    pub fn pending(&self) -> usize {
        let core = self.core.lock();
        self.queue.len() + usize::from(core.has_stalled())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SinkError::Closed)
        }
    }

    /// Drain unless another thread already is
    ///
    /// After a clean drain the queue is checked once more: a producer that
    /// pushed while this thread still held the lock saw it busy and left.
    fn try_drain(&self) {
        while let Some(mut core) = self.core.try_lock() {
            let result = self.drain_locked(&mut core);
            drop(core);

            match result {
                Ok(_) if self.is_open() && !self.queue.is_empty() => continue,
                Ok(_) => return,
                Err(e) => {
                    self.error_logger.error("drain stopped", &e);
                    return;
                }
            }
        }
    }

    /// Persist the stalled item, then the queue, until empty or a failure
    fn drain_locked(&self, core: &mut DrainCore<T>) -> Result<usize> {
        if !core.is_attached() {
            return Ok(0);
        }

        self.draining.store(true, Ordering::Release);
        self.metrics.record_drain();
        let result = self.drain_queue(core);
        self.draining.store(false, Ordering::Release);
        result
    }

    fn drain_queue(&self, core: &mut DrainCore<T>) -> Result<usize> {
        let mut written = 0usize;

        let resumed = core.resume()?;
        if let Some(outcome) = resumed {
            written += self.count(outcome);
        }

        while let Some(item) = self.queue.pop() {
            let outcome = core.persist(item)?;
            written += self.count(outcome);
        }
        Ok(written)
    }

    fn count(&self, outcome: Persisted) -> usize {
        match outcome {
            Persisted::Written => 1,
            Persisted::Skipped(e) => {
                self.error_logger.error("mapping failed, item skipped", &e);
                0
            }
        }
    }
}

impl<T> Drop for LineSink<T> {
    fn drop(&mut self) {
        if self.is_open() {
            self.close();
        }
    }
}

impl<T> std::fmt::Debug for LineSink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSink")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .field("queued", &self.queue.len())
            .finish()
    }
}
