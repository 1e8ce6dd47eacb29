//! Per-item persistence step shared by the sinks
//!
//! [`DrainCore`] owns the open handle and the item mapper. Callers hand it
//! one item at a time; it maps, appends, and flushes. When a step fails the
//! item is parked in a single stalled slot and the next drain resumes from
//! exactly where the failure happened:
//!
//! ```text
//! Unmapped(item)  --map-->  Unwritten(line, offset)  --append-->  Unflushed(line)  --flush-->  done
//! ```
//!
//! Appends resume at the recorded offset and resuming from `Unflushed` only
//! flushes, so bytes the handle already accepted are never appended twice.
//! Only the stalled line can have bytes buffered in the handle, since every
//! other line was flushed before the next was appended. When a handle is
//! released without its final flush succeeding, those bytes are discarded
//! and the line goes back to `Unwritten` at the first byte that was lost.

use std::io;
use std::sync::Arc;

use crate::common::{MapFailurePolicy, Result, SinkError, SinkMetrics};
use crate::mapper::{ItemMapper, MapError};
use crate::target::{AppendTarget, AppendWrite};

/// Where a failed item stopped
enum Stalled<T> {
    /// Mapping failed under [`MapFailurePolicy::Retain`]
    Unmapped(T),
    /// Mapped; the handle accepted the first `offset` bytes before failing
    Unwritten { line: String, offset: usize },
    /// Appended, but the flush failed
    Unflushed { line: String },
}

/// Result of persisting one item
#[derive(Debug)]
pub(crate) enum Persisted {
    Written,
    /// Dropped under [`MapFailurePolicy::Skip`]
    Skipped(MapError),
}

pub(crate) struct DrainCore<T> {
    mapper: Box<dyn ItemMapper<T>>,
    target: Arc<dyn AppendTarget>,
    writer: Option<Box<dyn AppendWrite>>,
    stalled: Option<Stalled<T>>,
    map_failure: MapFailurePolicy,
    metrics: Arc<SinkMetrics>,
}

impl<T> DrainCore<T> {
    /// Create a core with no open handle
    pub(crate) fn new(
        mapper: Box<dyn ItemMapper<T>>,
        target: Arc<dyn AppendTarget>,
        map_failure: MapFailurePolicy,
        metrics: Arc<SinkMetrics>,
    ) -> Self {
        Self {
            mapper,
            target,
            writer: None,
            stalled: None,
            map_failure,
            metrics,
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.writer.is_some()
    }

    pub(crate) fn has_stalled(&self) -> bool {
        self.stalled.is_some()
    }

    pub(crate) fn describe_target(&self) -> String {
        self.target.describe()
    }

    /// Open a handle on the target; no-op if one is already open
    pub(crate) fn attach(&mut self) -> Result<()> {
        if self.writer.is_none() {
            let writer = self
                .target
                .open()
                .map_err(|e| SinkError::open(self.target.describe(), e))?;
            self.writer = Some(writer);
        }
        Ok(())
    }

    /// Finish and drop the handle, returning the bytes it wrote
    ///
    /// The handle is gone afterwards even if finishing it failed. A line
    /// stalled before its flush counts as written once the final flush
    /// succeeds. If that flush fails, the bytes still buffered are discarded
    /// with the handle and the stalled line is rewound past them, so the next
    /// handle appends exactly what never reached the destination.
    pub(crate) fn detach(&mut self) -> io::Result<u64> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(0);
        };
        let bytes = writer.bytes_written();

        if let Err(e) = writer.flush() {
            self.metrics.record_write_error();
            self.rewind(writer.buffered());
            writer.abandon();
            return Err(e);
        }

        if let Some(Stalled::Unflushed { line }) = &self.stalled {
            let bytes = line.len() as u64;
            self.stalled = None;
            self.metrics.record_written(bytes);
        }
        writer.finish()?;
        Ok(bytes)
    }

    /// Move a stalled line back by the `lost` bytes its handle never delivered
    fn rewind(&mut self, lost: usize) {
        self.stalled = match self.stalled.take() {
            Some(Stalled::Unflushed { line }) => {
                let offset = line.len().saturating_sub(lost);
                Some(Stalled::Unwritten { line, offset })
            }
            Some(Stalled::Unwritten { line, offset }) => Some(Stalled::Unwritten {
                line,
                offset: offset.saturating_sub(lost),
            }),
            other => other,
        };
    }

    /// Give up on the stalled item, if any
    pub(crate) fn discard_stalled(&mut self) -> bool {
        self.stalled.take().is_some()
    }

    /// Retry the stalled item from the step that failed
    ///
    /// Returns `Ok(None)` when nothing was stalled.
    pub(crate) fn resume(&mut self) -> Result<Option<Persisted>> {
        match self.stalled.take() {
            None => Ok(None),
            Some(Stalled::Unmapped(item)) => self.persist(item).map(Some),
            Some(Stalled::Unwritten { line, offset }) => self.write_line(line, offset).map(Some),
            Some(Stalled::Unflushed { line }) => self.flush_line(line).map(Some),
        }
    }

    /// Map, append, and flush one item
    ///
    /// On error the item stays stalled unless the mapping failed under
    /// [`MapFailurePolicy::Skip`], which is reported as [`Persisted::Skipped`].
    pub(crate) fn persist(&mut self, item: T) -> Result<Persisted> {
        let line = match self.mapper.map(&item) {
            Ok(line) => line.unwrap_or_default(),
            Err(e) => {
                self.metrics.record_map_error();
                return match self.map_failure {
                    MapFailurePolicy::Retain => {
                        self.stalled = Some(Stalled::Unmapped(item));
                        Err(SinkError::Map(e))
                    }
                    MapFailurePolicy::Skip => {
                        self.metrics.record_skipped();
                        Ok(Persisted::Skipped(e))
                    }
                };
            }
        };
        self.write_line(line, 0)
    }

    /// Append `line` from `offset` on, then flush it
    fn write_line(&mut self, line: String, mut offset: usize) -> Result<Persisted> {
        let Some(writer) = self.writer.as_mut() else {
            self.stalled = Some(Stalled::Unwritten { line, offset });
            return Err(SinkError::Closed);
        };

        while offset < line.len() {
            match writer.append(&line.as_bytes()[offset..]) {
                Ok(0) => {
                    self.metrics.record_write_error();
                    self.stalled = Some(Stalled::Unwritten { line, offset });
                    return Err(SinkError::Io(io::Error::from(io::ErrorKind::WriteZero)));
                }
                Ok(accepted) => offset += accepted,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.metrics.record_write_error();
                    self.stalled = Some(Stalled::Unwritten { line, offset });
                    return Err(SinkError::Io(e));
                }
            }
        }
        self.flush_line(line)
    }

    fn flush_line(&mut self, line: String) -> Result<Persisted> {
        let Some(writer) = self.writer.as_mut() else {
            self.stalled = Some(Stalled::Unflushed { line });
            return Err(SinkError::Closed);
        };

        if let Err(e) = writer.flush() {
            self.metrics.record_write_error();
            self.stalled = Some(Stalled::Unflushed { line });
            return Err(SinkError::Io(e));
        }
        self.metrics.record_written(line.len() as u64);
        Ok(Persisted::Written)
    }
}
