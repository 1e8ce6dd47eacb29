//! Configuration validation
//!
//! Rejects values the sink cannot run with:
//! - Zero write buffer
//! - Fewer than one write attempt per retry round
//! - An output path that is present but empty

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let sink = &config.sink;

    if sink.buffer_size == 0 {
        return Err(ConfigError::invalid_value(
            "sink.buffer_size",
            "must be greater than 0",
        ));
    }

    if sink.max_write_retries == 0 {
        return Err(ConfigError::invalid_value(
            "sink.max_write_retries",
            "must be at least 1",
        ));
    }

    if let Some(ref path) = sink.path
        && path.as_os_str().is_empty()
    {
        return Err(ConfigError::invalid_value("sink.path", "must not be empty"));
    }

    Ok(())
}
