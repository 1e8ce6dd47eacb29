//! Logging configuration
//!
//! Spool logs to stderr only; stdout is left to whatever the caller pipes.
//! `level` sets the overall verbosity, and `sink_level` can raise or lower
//! the sink library alone, which is where drain failures are reported.

use std::fmt;

use serde::Deserialize;

/// Tracing target of the sink library
const SINKS_TARGET: &str = "spool_sinks";

/// Verbosity, lowest to highest severity
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// How log lines are rendered on stderr
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    /// One JSON object per line
    Json,
}

/// `[log]` section
///
/// ```toml
/// [log]
/// level = "warn"
/// sink_level = "debug"
/// format = "json"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default: info
    pub level: LogLevel,

    /// Override for the sink library; follows `level` when unset
    pub sink_level: Option<LogLevel>,

    /// Default: console
    pub format: LogFormat,
}

impl LogConfig {
    /// Filter directive for `tracing_subscriber::EnvFilter`
    pub fn directive(&self) -> String {
        match self.sink_level {
            Some(sink) if sink != self.level => format!("{},{SINKS_TARGET}={sink}", self.level),
            _ => self.level.to_string(),
        }
    }
}
