//! In-memory append target
//!
//! Appends land in a per-handle buffer and only reach the shared contents on
//! flush, the same visibility a buffered file gives. Failures can be injected
//! to exercise drain error paths.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{AppendTarget, AppendWrite};

#[derive(Debug, Default)]
struct MemoryState {
    contents: Mutex<Vec<u8>>,
    fail_appends: AtomicUsize,
    fail_flushes: AtomicUsize,
    fail_open: AtomicBool,
    tear_at: Mutex<Option<usize>>,
    opens: AtomicU64,
    finishes: AtomicU64,
}

/// Shared in-memory destination
///
/// Clones share the same contents, so a test can keep one clone and hand
/// the other to a sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    state: Arc<MemoryState>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flushed contents so far
    pub fn contents(&self) -> Vec<u8> {
        self.state.contents.lock().clone()
    }

    /// Flushed contents as (lossy) UTF-8
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.state.contents.lock()).into_owned()
    }

    /// Flushed contents split into `\n`-terminated lines
    pub fn lines(&self) -> Vec<String> {
        self.contents_string().lines().map(str::to_owned).collect()
    }

    /// Make the next `n` appends fail
    pub fn fail_appends(&self, n: usize) {
        self.state.fail_appends.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` flushes fail
    pub fn fail_flushes(&self, n: usize) {
        self.state.fail_flushes.store(n, Ordering::SeqCst);
    }

    /// Make the next append accept only its first `accept` bytes and the
    /// append after it fail, as a write cut short by a full disk would
    pub fn tear_next_append(&self, accept: usize) {
        *self.state.tear_at.lock() = Some(accept);
    }

    /// Make every open fail until switched off
    pub fn fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Number of successful opens
    pub fn open_count(&self) -> u64 {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Number of handles finished
    pub fn finish_count(&self) -> u64 {
        self.state.finishes.load(Ordering::SeqCst)
    }
}

impl AppendTarget for MemoryTarget {
    fn open(&self) -> io::Result<Box<dyn AppendWrite>> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected open failure",
            ));
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryWrite {
            state: Arc::clone(&self.state),
            buffer: Vec::new(),
            bytes_written: 0,
        }))
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

struct MemoryWrite {
    state: Arc<MemoryState>,
    buffer: Vec<u8>,
    bytes_written: u64,
}

/// Consume one injected failure if any are left
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl AppendWrite for MemoryWrite {
    fn append(&mut self, line: &[u8]) -> io::Result<usize> {
        if take_failure(&self.state.fail_appends) {
            return Err(io::Error::other("injected append failure"));
        }
        let accepted = match self.state.tear_at.lock().take() {
            Some(accept) => {
                self.state.fail_appends.fetch_add(1, Ordering::SeqCst);
                accept.min(line.len())
            }
            None => line.len(),
        };
        self.buffer.extend_from_slice(&line[..accepted]);
        self.bytes_written += accepted as u64;
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        if take_failure(&self.state.fail_flushes) {
            return Err(io::Error::other("injected flush failure"));
        }
        self.state.contents.lock().append(&mut self.buffer);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.flush()?;
        self.state.finishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
