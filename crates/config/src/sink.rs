//! Line sink configuration
//!
//! Where lines go and how the sink reacts to failures.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// How the output file is treated on first open
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// Start from an empty file (default)
    #[default]
    Truncate,
    /// Keep existing content and add to the end
    Append,
}

/// What to do with an item whose mapping fails
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MapFailure {
    /// Log it, count it, and move on (default)
    #[default]
    Skip,
    /// Keep the item queued and retry it on the next drain
    Retain,
}

/// Line sink configuration
///
/// # Example
///
/// ```toml
/// [sink]
/// path = "out/lines.log"
/// mode = "append"
/// map_failure = "retain"
/// retry_delay = "50ms"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkSection {
    /// Output file; may instead be given on the command line
    /// Default: none
    pub path: Option<PathBuf>,

    /// Truncate or append on first open
    /// Default: truncate
    pub mode: FileMode,

    /// Write buffer size in bytes
    /// Default: 64KB
    pub buffer_size: usize,

    /// Mapping failure handling
    /// Default: skip
    pub map_failure: MapFailure,

    /// Minimum interval between repeated drain error logs
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub error_log_interval: Duration,

    /// Write attempts per retry round (background writer)
    /// Default: 3
    pub max_write_retries: usize,

    /// Delay between write attempts (background writer)
    /// Default: 10ms
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            path: None,
            mode: FileMode::Truncate,
            buffer_size: 64 * 1024, // 64KB
            map_failure: MapFailure::Skip,
            error_log_interval: Duration::from_secs(10),
            max_write_retries: 3,
            retry_delay: Duration::from_millis(10),
        }
    }
}
