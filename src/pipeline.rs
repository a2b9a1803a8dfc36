//! Phase entry points wiring configuration, record files and orchestrators.
//!
//! Each phase builds its own [`Fetcher`] and [`PolitenessGate`], so the
//! pacing clock and robots.txt cache live exactly as long as the phase.
//! A missing input file is the only fatal condition; per-item failures are
//! handled inside the orchestrators.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use indicatif::ProgressBar;
use thiserror::Error;
use tracing::info;

use crate::config::CrawlConfig;
use crate::discover::{DiscoveryOrchestrator, DiscoveryReport};
use crate::download::{DownloadOrchestrator, DownloadStats, EngineError};
use crate::fetch::Fetcher;
use crate::records::{RecordError, read_discovered, read_seeds, write_discovered};
use crate::robots::PolitenessGate;

/// Errors that abort a whole phase.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input file does not exist.
    #[error("missing input file {path}: {hint}")]
    MissingInput {
        /// The absent file.
        path: PathBuf,
        /// What the user should do about it.
        hint: &'static str,
    },

    /// Reading or writing a record file failed.
    #[error(transparent)]
    Records(#[from] RecordError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The download orchestrator could not start.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Optional hooks for a phase run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run-level cancellation flag.
    pub interrupted: Option<Arc<AtomicBool>>,
    /// Progress bar advanced per download record.
    pub progress: Option<ProgressBar>,
}

fn build_gate(config: &CrawlConfig, fetcher: &Fetcher) -> Arc<PolitenessGate> {
    Arc::new(PolitenessGate::new(fetcher.clone(), config.robots_fallback))
}

/// Runs discovery: reads seeds, visits them, writes the discovered file.
///
/// # Errors
///
/// Returns [`PipelineError::MissingInput`] if the seed file does not exist,
/// [`PipelineError::Records`] if it cannot be parsed or the output cannot be
/// written, and [`PipelineError::Client`] if the HTTP client cannot be built.
pub async fn run_discovery(
    config: &CrawlConfig,
    options: RunOptions,
) -> Result<DiscoveryReport, PipelineError> {
    if !config.sources_csv.exists() {
        return Err(PipelineError::MissingInput {
            path: config.sources_csv.clone(),
            hint: "create the seed file first",
        });
    }

    let seeds = read_seeds(&config.sources_csv)?;
    info!(seeds = seeds.len(), path = %config.sources_csv.display(), "loaded seeds");

    let fetcher = Fetcher::from_config(config)?;
    let gate = build_gate(config, &fetcher);
    let mut orchestrator = DiscoveryOrchestrator::new(fetcher, gate);
    if config.save_seed_pages {
        orchestrator = orchestrator.with_page_dir(config.html_dir());
    }
    if let Some(flag) = options.interrupted {
        orchestrator = orchestrator.with_interrupt(flag);
    }

    let report = orchestrator.run(&seeds).await;

    write_discovered(&config.discovered_csv, &report.records)?;
    info!(
        discovered = report.records.len(),
        path = %config.discovered_csv.display(),
        "wrote discovered links"
    );
    Ok(report)
}

/// Runs the download phase over the discovered file.
///
/// # Errors
///
/// Returns [`PipelineError::MissingInput`] if the discovered file does not
/// exist, [`PipelineError::Records`] if it cannot be parsed,
/// [`PipelineError::Client`] if the HTTP client cannot be built, and
/// [`PipelineError::Engine`] for invalid concurrency or an unusable output
/// directory.
pub async fn run_download(
    config: &CrawlConfig,
    options: RunOptions,
) -> Result<DownloadStats, PipelineError> {
    if !config.discovered_csv.exists() {
        return Err(PipelineError::MissingInput {
            path: config.discovered_csv.clone(),
            hint: "run discovery first",
        });
    }

    let records = read_discovered(&config.discovered_csv)?;
    info!(records = records.len(), path = %config.discovered_csv.display(), "loaded discovered links");

    let fetcher = Fetcher::from_config(config)?;
    let gate = build_gate(config, &fetcher);
    let mut orchestrator =
        DownloadOrchestrator::new(fetcher, gate, config.pdf_dir(), config.concurrency)?
            .with_max_filename_len(config.max_filename_len);
    if let Some(flag) = options.interrupted {
        orchestrator = orchestrator.with_interrupt(flag);
    }
    if let Some(progress) = options.progress {
        progress.set_length(records.len() as u64);
        orchestrator = orchestrator.with_progress(progress);
    }

    let stats = orchestrator.run(&records).await?;
    info!(
        downloaded = stats.downloaded(),
        output_dir = %config.pdf_dir().display(),
        "download phase finished"
    );
    Ok(stats)
}
