//! Tests for append targets

use std::fs;

use tempfile::TempDir;

use crate::target::{AppendTarget, DEFAULT_BUFFER_SIZE, FileTarget, MemoryTarget, WriteMode};

// ============================================================================
// FileTarget Tests
// ============================================================================

#[test]
fn test_file_target_defaults() {
    let target = FileTarget::new("out.log");
    assert_eq!(target.mode(), WriteMode::Truncate);
    assert_eq!(target.describe(), "out.log");
}

#[test]
fn test_file_target_append_and_flush() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.log");
    let target = FileTarget::new(&path).with_buffer_size(DEFAULT_BUFFER_SIZE);

    let mut handle = target.open().unwrap();
    handle.append(b"hello ").unwrap();
    handle.append(b"world\n").unwrap();
    handle.flush().unwrap();

    assert_eq!(handle.bytes_written(), 12);
    assert_eq!(fs::read_to_string(&path).unwrap(), "hello world\n");
    handle.finish().unwrap();
}

#[test]
fn test_file_target_creates_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a").join("b").join("out.log");

    let mut handle = FileTarget::new(&path).open().unwrap();
    handle.append(b"x").unwrap();
    handle.finish().unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"x");
}

#[test]
fn test_file_target_truncates_on_first_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.log");
    fs::write(&path, "stale\n").unwrap();

    let handle = FileTarget::new(&path).open().unwrap();
    handle.finish().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "");
}

#[test]
fn test_file_target_append_mode_keeps_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.log");
    fs::write(&path, "kept\n").unwrap();

    let mut handle = FileTarget::new(&path)
        .with_mode(WriteMode::Append)
        .open()
        .unwrap();
    handle.append(b"new\n").unwrap();
    handle.finish().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "kept\nnew\n");
}

#[test]
fn test_file_target_reopen_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.log");
    let target = FileTarget::new(&path);

    let mut first = target.open().unwrap();
    first.append(b"one\n").unwrap();
    first.finish().unwrap();

    let mut second = target.open().unwrap();
    second.append(b"two\n").unwrap();
    second.finish().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
}

#[test]
fn test_file_target_abandon_discards_buffer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.log");
    let target = FileTarget::new(&path);

    let mut handle = target.open().unwrap();
    handle.append(b"kept\n").unwrap();
    handle.flush().unwrap();
    handle.append(b"lost\n").unwrap();
    assert_eq!(handle.buffered(), 5);
    handle.abandon();

    assert_eq!(fs::read_to_string(&path).unwrap(), "kept\n");
}

#[test]
fn test_file_target_large_line_accepted_in_full() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.log");
    let target = FileTarget::new(&path).with_buffer_size(16);
    let line = vec![b'x'; 1000];

    let mut handle = target.open().unwrap();
    let mut offset = 0;
    while offset < line.len() {
        offset += handle.append(&line[offset..]).unwrap();
    }
    handle.finish().unwrap();

    assert_eq!(fs::read(&path).unwrap(), line);
}

#[test]
fn test_file_target_open_failure() {
    let dir = TempDir::new().unwrap();
    // A directory cannot be opened as a file
    let target = FileTarget::new(dir.path());
    assert!(target.open().is_err());
}

// ============================================================================
// MemoryTarget Tests
// ============================================================================

#[test]
fn test_memory_target_visible_after_flush() {
    let target = MemoryTarget::new();
    let mut handle = target.open().unwrap();

    handle.append(b"a\n").unwrap();
    assert!(target.contents().is_empty());

    handle.flush().unwrap();
    assert_eq!(target.lines(), vec!["a"]);
    assert_eq!(target.open_count(), 1);
}

#[test]
fn test_memory_target_injected_failures() {
    let target = MemoryTarget::new();
    let mut handle = target.open().unwrap();

    target.fail_appends(1);
    assert!(handle.append(b"lost").is_err());
    handle.append(b"a").unwrap();

    target.fail_flushes(1);
    assert!(handle.flush().is_err());
    // the buffered line survives a failed flush
    handle.flush().unwrap();

    assert_eq!(target.contents_string(), "a");
}

#[test]
fn test_memory_target_fail_open() {
    let target = MemoryTarget::new();
    target.fail_open(true);
    assert!(target.open().is_err());

    target.fail_open(false);
    assert!(target.open().is_ok());
    assert_eq!(target.open_count(), 1);
}

#[test]
fn test_memory_target_finish_flushes() {
    let target = MemoryTarget::new();
    let mut handle = target.open().unwrap();
    handle.append(b"tail").unwrap();
    handle.finish().unwrap();

    assert_eq!(target.contents(), b"tail");
    assert_eq!(target.finish_count(), 1);
}

#[test]
fn test_memory_target_torn_append() {
    let target = MemoryTarget::new();
    let mut handle = target.open().unwrap();

    target.tear_next_append(2);
    assert_eq!(handle.append(b"abcd").unwrap(), 2);
    assert!(handle.append(b"cd").is_err());
    assert_eq!(handle.append(b"cd").unwrap(), 2);
    handle.flush().unwrap();

    assert_eq!(target.contents_string(), "abcd");
    assert_eq!(handle.bytes_written(), 4);
}

#[test]
fn test_memory_target_abandon_drops_unflushed() {
    let target = MemoryTarget::new();
    let mut handle = target.open().unwrap();

    handle.append(b"a").unwrap();
    handle.flush().unwrap();
    handle.append(b"b").unwrap();
    assert_eq!(handle.buffered(), 1);
    handle.abandon();

    assert_eq!(target.contents_string(), "a");
    assert_eq!(target.finish_count(), 0);
}
