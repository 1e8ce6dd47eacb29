//! Append targets
//!
//! The backing resource a sink persists into. [`AppendTarget`] describes a
//! destination and opens handles on it; [`AppendWrite`] is the open handle
//! the drain appends to and flushes after every line.
//!
//! # Available Targets
//!
//! - [`FileTarget`] - Buffered file output, truncating or appending
//! - [`MemoryTarget`] - Shared in-memory buffer with fault injection
//!
//! # Example
//!
//! ```
//! use spool_sinks::target::{AppendTarget, FileTarget};
//!
//! let dir = tempfile::tempdir()?;
//! let target = FileTarget::new(dir.path().join("out.log"));
//! let mut handle = target.open()?;
//!
//! handle.append(b"hello\n")?;
//! handle.flush()?;
//! handle.finish()?;
//! # Ok::<(), std::io::Error>(())
//! ```

mod memory;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub use memory::MemoryTarget;

/// Default write buffer size for file targets (64KB)
///
/// The drain flushes after every line, so the buffer only has to hold
/// one line at a time.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// A destination that can be opened for appending
pub trait AppendTarget: Send + Sync {
    /// Open a new handle on this destination
    fn open(&self) -> io::Result<Box<dyn AppendWrite>>;

    /// Human-readable description for logs and errors
    fn describe(&self) -> String;
}

/// An open handle on an append target
///
/// This is object-safe and can be used with `Box<dyn AppendWrite>`.
pub trait AppendWrite: Send {
    /// Append a prefix of `line`, returning how many bytes were accepted
    ///
    /// An error means nothing was accepted. Callers keep appending the
    /// remainder until the whole line is in.
    fn append(&mut self, line: &[u8]) -> io::Result<usize>;

    /// Push everything appended so far to the destination
    fn flush(&mut self) -> io::Result<()>;

    /// Flush and release the handle
    fn finish(self: Box<Self>) -> io::Result<()>;

    /// Release the handle without flushing; buffered bytes are discarded
    fn abandon(self: Box<Self>) {}

    /// Bytes accepted by `append` that have not reached the destination
    fn buffered(&self) -> usize;

    /// Bytes appended through this handle
    fn bytes_written(&self) -> u64;
}

/// How a [`FileTarget`] treats existing content on first open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Start from an empty file
    #[default]
    Truncate,
    /// Keep existing content and append after it
    Append,
}

/// File destination with buffered writes
///
/// Parent directories are created on open. Only the first open honors
/// [`WriteMode::Truncate`]; later opens always append, so reopening a
/// closed sink keeps what it already persisted.
#[derive(Debug)]
pub struct FileTarget {
    path: PathBuf,
    mode: WriteMode,
    buffer_size: usize,
    opened: AtomicBool,
}

impl FileTarget {
    /// Create a truncating file target
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: WriteMode::Truncate,
            buffer_size: DEFAULT_BUFFER_SIZE,
            opened: AtomicBool::new(false),
        }
    }

    /// Set the write mode used on first open
    #[must_use]
    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the write buffer size
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }
}

impl AppendTarget for FileTarget {
    fn open(&self) -> io::Result<Box<dyn AppendWrite>> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let reopen = self.opened.load(Ordering::Acquire);
        let mut options = File::options();
        options.create(true);
        if reopen || self.mode == WriteMode::Append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options.open(&self.path)?;
        self.opened.store(true, Ordering::Release);

        tracing::debug!(path = %self.path.display(), reopen, "opened file target");

        Ok(Box::new(FileWrite {
            writer: BufWriter::with_capacity(self.buffer_size, file),
            bytes_written: 0,
        }))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

struct FileWrite {
    writer: BufWriter<File>,
    bytes_written: u64,
}

impl AppendWrite for FileWrite {
    fn append(&mut self, line: &[u8]) -> io::Result<usize> {
        let accepted = self.writer.write(line)?;
        self.bytes_written += accepted as u64;
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }

    fn abandon(self: Box<Self>) {
        // BufWriter flushes on drop unless the buffer is taken apart first
        let (_file, _unwritten) = self.writer.into_parts();
    }

    fn buffered(&self) -> usize {
        self.writer.buffer().len()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
#[path = "target_test.rs"]
mod target_test;
