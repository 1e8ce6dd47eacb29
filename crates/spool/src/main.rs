//! Spool - Ordered line persistence from stdin
//!
//! # Usage
//!
//! ```bash
//! # Copy stdin to a file, one line per item, flushed line by line
//! producer | spool write --output out/lines.log
//!
//! # Four producer threads, appending, JSON-encoded lines
//! producer | spool write -o out/lines.jsonl --threads 4 --append --json
//!
//! # Validate a config file
//! spool check --config spool.toml
//! ```

mod cmd;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use spool_config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Spool - Ordered, append-only line persistence
#[derive(Parser, Debug)]
#[command(name = "spool")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Persist stdin lines to a file
    Write(cmd::write::WriteArgs),

    /// Parse and validate a config file
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (log_level, log_format) =
        resolve_logging(cli.log_level.as_deref(), cli.config.as_deref());
    init_logging(&log_level, log_format)?;

    match cli.command {
        Command::Write(args) => cmd::write::run(args, cli.config.as_deref()).await,
        Command::Check => cmd::check::run(cli.config.as_deref()),
    }
}

/// Resolve log filter: CLI flag > config file > default "info"
fn resolve_logging(cli_level: Option<&str>, config_path: Option<&Path>) -> (String, LogFormat) {
    let log = config_path
        .filter(|path| path.exists())
        .and_then(|path| Config::from_file(path).ok())
        .map(|c| c.log)
        .unwrap_or_default();

    // CLI flag takes precedence
    let filter = match cli_level {
        Some(level) => level.to_string(),
        None => log.directive(),
    };
    (filter, log.format)
}

/// Initialize the tracing subscriber; logs go to stderr
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}
