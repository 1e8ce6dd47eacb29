//! Tests for common sink types

use std::io;
use std::time::Duration;

use crate::{
    DEFAULT_RETRY_DELAY, DEFAULT_WRITE_RETRIES, LineSinkConfig, MapError, MapFailurePolicy,
    MetricsSnapshot, SinkError, SinkMetrics,
};

#[test]
fn test_metrics_new() {
    let metrics = SinkMetrics::new();
    assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
}

#[test]
fn test_metrics_record_written() {
    let metrics = SinkMetrics::new();

    metrics.record_written(10);
    metrics.record_written(5);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.items_written, 2);
    assert_eq!(snapshot.bytes_written, 15);
    assert_eq!(snapshot.flush_count, 2);
}

#[test]
fn test_metrics_error_tracking() {
    let metrics = SinkMetrics::new();

    metrics.record_received(3);
    metrics.record_write_error();
    metrics.record_write_error();
    metrics.record_map_error();
    metrics.record_skipped();
    metrics.record_dropped(4);
    metrics.record_drain();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.items_received, 3);
    assert_eq!(snapshot.write_errors, 2);
    assert_eq!(snapshot.map_errors, 1);
    assert_eq!(snapshot.items_skipped, 1);
    assert_eq!(snapshot.items_dropped, 4);
    assert_eq!(snapshot.drains, 1);
    assert_eq!(snapshot.items_written, 0);
}

#[test]
fn test_config_defaults() {
    let config = LineSinkConfig::default();
    assert_eq!(config.name, "line_sink");
    assert_eq!(config.map_failure, MapFailurePolicy::Skip);
    assert_eq!(config.error_log_interval, Duration::from_secs(10));
    assert_eq!(config.max_write_retries, DEFAULT_WRITE_RETRIES);
    assert_eq!(config.retry_delay, DEFAULT_RETRY_DELAY);
}

#[test]
fn test_config_chained_builders() {
    let config = LineSinkConfig::default()
        .with_name("audit")
        .with_map_failure(MapFailurePolicy::Retain)
        .with_error_log_interval(Duration::from_secs(1))
        .with_retries(0, Duration::from_millis(1));

    assert_eq!(config.name, "audit");
    assert_eq!(config.map_failure, MapFailurePolicy::Retain);
    assert_eq!(config.error_log_interval, Duration::from_secs(1));
    // Zero attempts would never write anything
    assert_eq!(config.max_write_retries, 1);
    assert_eq!(config.retry_delay, Duration::from_millis(1));
}

#[test]
fn test_error_display() {
    assert_eq!(SinkError::Closed.to_string(), "sink is closed");
    assert_eq!(
        SinkError::init("no runtime").to_string(),
        "failed to initialize sink: no runtime"
    );

    let err = SinkError::open("out.log", io::Error::new(io::ErrorKind::NotFound, "missing"));
    assert_eq!(err.to_string(), "failed to open out.log: missing");

    let err = SinkError::from(MapError::new("bad item"));
    assert_eq!(err.to_string(), "mapping failed: bad item");
}

#[test]
fn test_error_io_class() {
    assert!(SinkError::from(io::Error::other("disk full")).is_io());
    assert!(SinkError::open("x", io::Error::other("denied")).is_io());
    assert!(!SinkError::Closed.is_io());
    assert!(!SinkError::from(MapError::new("bad")).is_io());
}
