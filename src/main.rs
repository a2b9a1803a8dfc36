//! CLI entry point for govcrawl.

use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use govcrawl::{CrawlConfig, RunOptions, run_discovery, run_download};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::field::RecordFields;
use tracing_subscriber::fmt::FormatFields;
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

mod app_config;
mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let loaded = app_config::load_file_config(args.config.as_deref())?;
    let mut config = CrawlConfig::default();
    if let Some((_, file_config)) = &loaded {
        file_config.apply_to(&mut config)?;
    }
    args.apply_to(&mut config)?;

    init_tracing(default_level(&args), config.log_file.as_deref())?;

    debug!(?args, "CLI arguments parsed");
    if let Some((path, _)) = &loaded {
        info!(path = %path.display(), "loaded config file");
    }
    info!(
        user_agent = %config.user_agent,
        delay_ms = config.delay.as_millis(),
        robots_fallback = config.robots_fallback.as_str(),
        "govcrawl starting"
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight requests");
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    match args.command {
        Command::Discover { .. } => {
            let options = RunOptions {
                interrupted: Some(Arc::clone(&interrupted)),
                progress: None,
            };
            let report = run_discovery(&config, options)
                .await
                .context("discovery failed")?;
            info!(
                discovered = report.records.len(),
                scanned = report.seeds_scanned,
                invalid = report.seeds_invalid,
                skipped_robots = report.seeds_skipped_robots,
                failed = report.seeds_failed,
                interrupted = report.interrupted,
                "Discovery complete"
            );
        }
        Command::Download { .. } => {
            let progress = should_show_progress(args.quiet).then(new_progress_bar);
            let options = RunOptions {
                interrupted: Some(Arc::clone(&interrupted)),
                progress: progress.clone(),
            };
            let result = run_download(&config, options).await;
            if let Some(progress) = progress {
                progress.finish_and_clear();
            }
            let stats = result.context("download failed")?;
            info!(
                downloaded = stats.downloaded(),
                skipped_existing = stats.skipped_existing(),
                skipped_robots = stats.skipped_robots(),
                failed = stats.failed(),
                total = stats.total(),
                interrupted = stats.was_interrupted(),
                "Download complete"
            );
        }
    }

    Ok(())
}

/// Priority: `RUST_LOG` env var > quiet flag > verbose flag > default (info).
fn default_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_tracing(default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => Some(plain_file_layer(open_log_file(path)?)),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(io::stderr().is_terminal())
                .with_writer(io::stderr),
        )
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}

/// Span field formatter for the log file.
///
/// Formatted span fields are cached per formatter type, so the file layer
/// needs its own type to avoid reusing the colored fields of the stderr layer.
#[derive(Debug, Default)]
struct PlainFields(DefaultFields);

impl<'writer> FormatFields<'writer> for PlainFields {
    fn format_fields<R: RecordFields>(&self, writer: Writer<'writer>, fields: R) -> std::fmt::Result {
        self.0.format_fields(writer, fields)
    }
}

fn plain_file_layer<S>(file: File) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .fmt_fields(PlainFields::default())
        .with_writer(Mutex::new(file))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory '{}'", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file '{}'", path.display()))
}

fn should_show_progress(quiet: bool) -> bool {
    !quiet && io::stderr().is_terminal() && !std::env::var("TERM").is_ok_and(|t| t == "dumb")
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} documents [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}
