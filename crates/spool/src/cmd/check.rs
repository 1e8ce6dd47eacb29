//! Check command - Parse and validate a config file
//!
//! # Usage
//!
//! ```bash
//! spool check --config spool.toml
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use spool_config::Config;

/// Run the check command
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("invalid config {}", path.display()))?,
        None => {
            eprintln!("No --config given, showing defaults");
            Config::default()
        }
    };

    let sink = &config.sink;
    let path = sink
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(set with --output)".into());

    let sink_level = config
        .log
        .sink_level
        .map_or_else(|| "(same as log.level)".into(), |l| l.to_string());

    println!("config ok");
    println!("  log.level                {}", config.log.level);
    println!("  log.sink_level           {sink_level}");
    println!("  log.format               {:?}", config.log.format);
    println!("  sink.path                {path}");
    println!("  sink.mode                {:?}", sink.mode);
    println!("  sink.buffer_size         {}", sink.buffer_size);
    println!("  sink.map_failure         {:?}", sink.map_failure);
    println!("  sink.error_log_interval  {:?}", sink.error_log_interval);
    println!("  sink.max_write_retries   {}", sink.max_write_retries);
    println!("  sink.retry_delay         {:?}", sink.retry_delay);

    Ok(())
}
