//! Background Sink - Ordered persistence on a dedicated writer
//!
//! Same contract as [`LineSink`](crate::LineSink) but producers never drain:
//! every submission is a channel send, and one blocking writer task owns the
//! handle. Producer latency no longer depends on write latency.
//!
//! # Architecture
//!
//! ```text
//! [write()] --UnboundedSender--> [writer task (spawn_blocking)] --map/append/flush--> [Target]
//! ```
//!
//! # Failure handling
//!
//! A failed append or flush is retried in place up to `max_write_retries`
//! times, `retry_delay` apart. While the sink is open the writer keeps
//! retrying in rounds, so items behind a failing one wait rather than get
//! reordered or lost. Once the sink is closing, an item that fails a whole
//! round is dropped and counted in `items_dropped`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::common::{LineSinkConfig, MetricsSnapshot, Result, SinkError, SinkMetrics};
use crate::drain::{DrainCore, Persisted};
use crate::mapper::ItemMapper;
use crate::target::AppendTarget;
use crate::util::RateLimitedLogger;

/// Ordered sink whose writes happen on a dedicated blocking task
pub struct BackgroundSink<T> {
    name: String,
    sender: Option<mpsc::UnboundedSender<T>>,
    writer: Option<JoinHandle<()>>,
    open: Arc<AtomicBool>,

    /// Items sent but not yet persisted, dropped, or skipped
    queued: Arc<AtomicUsize>,

    metrics: Arc<SinkMetrics>,
}

impl<T: Send + 'static> BackgroundSink<T> {
    /// Open `target` and start the writer task
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Init`] outside a tokio runtime and
    /// [`SinkError::Open`] if the target cannot be opened.
    pub fn spawn<M, A>(config: LineSinkConfig, mapper: M, target: A) -> Result<Self>
    where
        M: ItemMapper<T> + 'static,
        A: AppendTarget + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SinkError::init("background sink requires a tokio runtime"))?;

        let metrics = Arc::new(SinkMetrics::new());
        let mut core = DrainCore::new(
            Box::new(mapper),
            Arc::new(target),
            config.map_failure,
            Arc::clone(&metrics),
        );
        if let Err(e) = core.attach() {
            tracing::error!(sink = %config.name, error = %e, "failed to open sink");
            return Err(e);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        let queued = Arc::new(AtomicUsize::new(0));

        let task = WriterTask {
            error_logger: RateLimitedLogger::new(config.name.clone(), config.error_log_interval),
            name: config.name.clone(),
            receiver,
            core,
            open: Arc::clone(&open),
            queued: Arc::clone(&queued),
            retry: WriterRetryConfig {
                max_retries: config.max_write_retries.max(1),
                retry_delay: config.retry_delay,
            },
            metrics: Arc::clone(&metrics),
        };
        let writer = runtime.spawn_blocking(move || task.run());

        tracing::debug!(sink = %config.name, "background sink started");

        Ok(Self {
            name: config.name,
            sender: Some(sender),
            writer: Some(writer),
            open,
            queued,
            metrics,
        })
    }

    /// Submit one item; never blocks
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] if the writer is gone.
    pub fn write(&self, item: T) -> Result<()> {
        let sender = self.sender()?;
        self.queued.fetch_add(1, Ordering::AcqRel);
        if sender.send(item).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(SinkError::Closed);
        }
        self.metrics.record_received(1);
        Ok(())
    }

    /// Submit several items in iteration order, returning how many were sent
    pub fn write_batch<I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let sender = self.sender()?;
        let mut count = 0usize;
        for item in items {
            self.queued.fetch_add(1, Ordering::AcqRel);
            if sender.send(item).is_err() {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                self.metrics.record_received(count as u64);
                return Err(SinkError::Closed);
            }
            count += 1;
        }
        self.metrics.record_received(count as u64);
        Ok(count)
    }

    /// Stop accepting items, let the writer drain, and release the target
    pub async fn close(mut self) -> MetricsSnapshot {
        self.open.store(false, Ordering::Release);
        // Dropping the sender ends the writer loop once the channel is empty
        drop(self.sender.take());

        if let Some(writer) = self.writer.take()
            && let Err(e) = writer.await
        {
            tracing::error!(sink = %self.name, error = %e, "writer task failed");
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            sink = %self.name,
            items_written = snapshot.items_written,
            items_dropped = snapshot.items_dropped,
            write_errors = snapshot.write_errors,
            "background sink closed"
        );
        snapshot
    }

    fn sender(&self) -> Result<&mpsc::UnboundedSender<T>> {
        match &self.sender {
            Some(sender) if self.is_open() => Ok(sender),
            _ => Err(SinkError::Closed),
        }
    }
}

impl<T> BackgroundSink<T> {
    /// Whether the sink accepts items
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Items submitted but not yet settled by the writer
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl<T> Drop for BackgroundSink<T> {
    fn drop(&mut self) {
        // The writer drains what was sent and exits on its own
        self.open.store(false, Ordering::Release);
    }
}

/// Retry behavior of the writer task
#[derive(Debug, Clone, Copy)]
struct WriterRetryConfig {
    max_retries: usize,
    retry_delay: Duration,
}

struct WriterTask<T> {
    name: String,
    receiver: mpsc::UnboundedReceiver<T>,
    core: DrainCore<T>,
    open: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    retry: WriterRetryConfig,
    metrics: Arc<SinkMetrics>,
    error_logger: RateLimitedLogger,
}

impl<T> WriterTask<T> {
    fn run(mut self) {
        while let Some(item) = self.receiver.blocking_recv() {
            self.persist(item);
            self.queued.fetch_sub(1, Ordering::AcqRel);
        }

        if let Err(e) = self.core.detach() {
            tracing::error!(sink = %self.name, error = %e, "failed to release target");
        }
        tracing::debug!(sink = %self.name, "writer task finished");
    }

    /// Persist one item, retrying in rounds while the sink is open
    fn persist(&mut self, item: T) {
        let mut result = self.core.persist(item);
        let mut attempts = 1;

        loop {
            let e = match result {
                Ok(Persisted::Written) => return,
                Ok(Persisted::Skipped(e)) => {
                    self.error_logger.error("mapping failed, item skipped", &e);
                    return;
                }
                Err(e) => e,
            };
            self.error_logger.error("write failed", &e);

            if attempts >= self.retry.max_retries {
                if !self.open.load(Ordering::Acquire) {
                    self.core.discard_stalled();
                    self.metrics.record_dropped(1);
                    tracing::error!(
                        sink = %self.name,
                        error = %e,
                        attempts,
                        "write failed after all retries at close, item dropped"
                    );
                    return;
                }
                attempts = 0;
            }

            std::thread::sleep(self.retry.retry_delay);
            attempts += 1;
            result = match self.core.resume() {
                Ok(Some(outcome)) => Ok(outcome),
                Ok(None) => return,
                Err(e) => Err(e),
            };
        }
    }
}
