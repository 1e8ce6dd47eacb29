//! Write command - Persist stdin lines to a file, in order
//!
//! Each stdin line is one item. Lines are dealt round-robin to producer
//! threads that share one sink, so with `--threads 1` the output is an exact
//! copy of the input; with more threads each producer's lines keep their
//! relative order but producers interleave.
//!
//! # Usage
//!
//! ```bash
//! producer | spool write -o out/lines.log
//! producer | spool write -o out/lines.log --threads 4 --append
//! producer | spool write -o out/lines.jsonl --json --background
//! ```

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, bail};
use clap::Args;
use crossbeam::channel;
use spool_config::{Config, FileMode, MapFailure};
use spool_sinks::{
    BackgroundSink, DisplayMapper, FileTarget, ItemMapper, JsonLinesMapper, LineMapper, LineSink,
    LineSinkConfig, MapError, MapFailurePolicy, MetricsSnapshot, WriteMode,
};

/// Lines buffered per producer before the stdin reader waits
const PRODUCER_QUEUE: usize = 1024;

/// Write command arguments
#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Output file (overrides [sink].path)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Number of producer threads submitting lines
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    threads: u16,

    /// Append to the output file instead of truncating it
    #[arg(long)]
    append: bool,

    /// Write each line as a JSON string
    #[arg(long)]
    json: bool,

    /// Persist on a dedicated writer task instead of the producer threads
    #[arg(long)]
    background: bool,
}

/// How a stdin line becomes an output line
#[derive(Debug, Clone, Copy)]
enum LineFormat {
    Plain,
    Json,
}

impl ItemMapper<String> for LineFormat {
    fn map(&self, line: &String) -> std::result::Result<Option<String>, MapError> {
        match self {
            Self::Plain => LineMapper::new(DisplayMapper).map(line),
            Self::Json => JsonLinesMapper.map(line),
        }
    }
}

/// Run the write command
pub async fn run(args: WriteArgs, config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let Some(path) = args.output.clone().or_else(|| config.sink.path.clone()) else {
        bail!("no output file: pass --output or set [sink].path");
    };

    let mode = if args.append || config.sink.mode == FileMode::Append {
        WriteMode::Append
    } else {
        WriteMode::Truncate
    };
    let target = FileTarget::new(&path)
        .with_mode(mode)
        .with_buffer_size(config.sink.buffer_size);
    let format = if args.json {
        LineFormat::Json
    } else {
        LineFormat::Plain
    };
    let sink_config = sink_config(&config);

    tracing::debug!(
        path = %path.display(),
        threads = args.threads,
        background = args.background,
        "starting write"
    );

    let input = io::BufReader::new(io::stdin());
    let snapshot = write_lines(
        input,
        sink_config,
        format,
        target,
        args.threads,
        args.background,
    )
    .await?;

    print_summary(&path, &snapshot);

    if snapshot.items_dropped > 0 {
        bail!(
            "{} lines could not be persisted to {}",
            snapshot.items_dropped,
            path.display()
        );
    }
    Ok(())
}

/// Persist every line of `input` through the chosen sink
///
/// Producers block on the sink, so the inline path runs on the blocking
/// pool and never holds a runtime worker.
async fn write_lines<R>(
    input: R,
    config: LineSinkConfig,
    format: LineFormat,
    target: FileTarget,
    threads: u16,
    background: bool,
) -> Result<MetricsSnapshot>
where
    R: BufRead + Send + 'static,
{
    if background {
        return write_background(input, config, format, target, threads).await;
    }
    tokio::task::spawn_blocking(move || write_inline(input, config, format, target, threads))
        .await
        .context("writer thread failed")?
}

/// Producers drain the sink themselves
fn write_inline(
    input: impl BufRead,
    config: LineSinkConfig,
    format: LineFormat,
    target: FileTarget,
    threads: u16,
) -> Result<MetricsSnapshot> {
    let sink = LineSink::with_config(config, format, target).context("failed to open output")?;
    let sink = Arc::new(sink);

    let producer = Arc::clone(&sink);
    let fed = feed(input, threads, move |line| producer.write(line));

    if let Err(e) = sink.flush() {
        tracing::warn!(error = %e, "final flush incomplete");
    }
    let snapshot = sink.close();
    fed?;

    let pending = sink.pending();
    if pending > 0 {
        bail!("{pending} lines could not be persisted");
    }
    Ok(snapshot)
}

/// A dedicated writer task drains the sink
async fn write_background(
    input: impl BufRead + Send + 'static,
    config: LineSinkConfig,
    format: LineFormat,
    target: FileTarget,
    threads: u16,
) -> Result<MetricsSnapshot> {
    let sink = BackgroundSink::spawn(config, format, target).context("failed to open output")?;
    let sink = Arc::new(sink);

    let producer = Arc::clone(&sink);
    let fed = tokio::task::spawn_blocking(move || feed(input, threads, move |line| producer.write(line)))
        .await
        .context("stdin reader failed")?;

    let sink = Arc::into_inner(sink).context("producers still hold the sink")?;
    let snapshot = sink.close().await;
    fed?;
    Ok(snapshot)
}

fn sink_config(config: &Config) -> LineSinkConfig {
    let map_failure = match config.sink.map_failure {
        MapFailure::Retain => MapFailurePolicy::Retain,
        MapFailure::Skip => MapFailurePolicy::Skip,
    };

    LineSinkConfig::default()
        .with_name("spool")
        .with_map_failure(map_failure)
        .with_error_log_interval(config.sink.error_log_interval)
        .with_retries(config.sink.max_write_retries, config.sink.retry_delay)
}

/// Read input lines and deal them round-robin to `threads` producers
///
/// Returns the number of lines read.
fn feed<F>(input: impl BufRead, threads: u16, submit: F) -> Result<u64>
where
    F: Fn(String) -> spool_sinks::Result<()> + Send + Sync + 'static,
{
    let submit = Arc::new(submit);
    let (senders, handles): (Vec<_>, Vec<_>) = (0..threads)
        .map(|_| {
            let (tx, rx) = channel::bounded::<String>(PRODUCER_QUEUE);
            let submit = Arc::clone(&submit);
            let handle = thread::spawn(move || -> spool_sinks::Result<()> {
                for line in rx {
                    submit(line)?;
                }
                Ok(())
            });
            (tx, handle)
        })
        .collect();

    let mut lines = 0u64;
    let mut read_result = Ok(());
    for (i, line) in input.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                read_result = Err(e);
                break;
            }
        };
        // a closed channel means that producer stopped on an error
        if senders[i % senders.len()].send(line).is_err() {
            break;
        }
        lines += 1;
    }
    drop(senders);

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))?
            .context("producer stopped")?;
    }
    read_result.context("failed to read stdin")?;

    tracing::debug!(lines, "input exhausted");
    Ok(lines)
}

fn print_summary(path: &Path, snapshot: &MetricsSnapshot) {
    eprintln!(
        "{}: {} lines, {} bytes written ({} write errors, {} skipped, {} dropped)",
        path.display(),
        snapshot.items_written,
        snapshot.bytes_written,
        snapshot.write_errors,
        snapshot.items_skipped,
        snapshot.items_dropped,
    );
}
