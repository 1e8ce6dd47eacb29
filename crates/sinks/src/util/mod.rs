//! Sink utilities
//!
//! - **rate_limited_logger**: keeps a persistently failing drain from
//!   flooding the log

pub mod rate_limited_logger;

pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};
