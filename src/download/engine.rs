//! Download orchestrator for discovered document records.
//!
//! This module provides the [`DownloadOrchestrator`] which walks discovered
//! records in input order, gates each URL through robots.txt, skips files
//! already on disk, and writes fetched bytes atomically.
//!
//! # Concurrency Model
//!
//! - With `concurrency = 1` (the default) records are processed strictly one
//!   after another.
//! - With a larger value each record runs in its own Tokio task, bounded by a
//!   semaphore. All tasks share one [`Fetcher`], so the global pacing clock
//!   still spaces every request `delay` apart.
//! - A failing record never cancels other records.
//! - When the interrupt flag is raised no new records are scheduled;
//!   in-flight records run to completion.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use govcrawl::{DownloadOrchestrator, Fetcher, PolitenessGate, RobotsFallback};
//!
//! # async fn example(records: Vec<govcrawl::DiscoveredRecord>) -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new("MyBot/1.0", Duration::from_secs(30), Duration::from_secs(3))?;
//! let gate = Arc::new(PolitenessGate::new(fetcher.clone(), RobotsFallback::Allow));
//! let orchestrator = DownloadOrchestrator::new(fetcher, gate, PathBuf::from("data/raw/pdfs"), 1)?;
//! let stats = orchestrator.run(&records).await?;
//! println!("downloaded {}, skipped {}", stats.downloaded(), stats.skipped_existing());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashSet;
use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::filename::safe_filename;
use super::storage::{is_existing_non_empty, write_atomic};
use crate::config::DEFAULT_MAX_FILENAME_LEN;
use crate::fetch::Fetcher;
use crate::records::DiscoveredRecord;
use crate::robots::PolitenessGate;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 32;

/// Error type for download orchestration.
///
/// Per-record failures never surface here; they are logged and counted.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        /// Directory that could not be created.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Statistics from a download run.
///
/// Uses atomic counters so concurrent workers can update it through an `Arc`.
#[derive(Debug, Default)]
pub struct DownloadStats {
    downloaded: AtomicUsize,
    skipped_existing: AtomicUsize,
    skipped_robots: AtomicUsize,
    failed: AtomicUsize,
    interrupted: AtomicBool,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files fetched and written during this run.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Records skipped because their file already exists and is non-empty.
    #[must_use]
    pub fn skipped_existing(&self) -> usize {
        self.skipped_existing.load(Ordering::SeqCst)
    }

    /// Records skipped because robots.txt disallows them.
    #[must_use]
    pub fn skipped_robots(&self) -> usize {
        self.skipped_robots.load(Ordering::SeqCst)
    }

    /// Records whose fetch or write failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Records attempted (all outcomes).
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded() + self.skipped_existing() + self.skipped_robots() + self.failed()
    }

    /// Whether the run stopped early because of an interrupt.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn record(&self, outcome: RecordOutcome) {
        let counter = match outcome {
            RecordOutcome::Downloaded => &self.downloaded,
            RecordOutcome::SkippedExisting => &self.skipped_existing,
            RecordOutcome::SkippedRobots => &self.skipped_robots,
            RecordOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Downloaded,
    SkippedExisting,
    SkippedRobots,
    Failed,
}

/// Shared state handed to every record task.
#[derive(Debug)]
struct RecordContext {
    fetcher: Fetcher,
    gate: Arc<PolitenessGate>,
    output_dir: PathBuf,
}

/// Downloads discovered documents into one output directory.
#[derive(Debug)]
pub struct DownloadOrchestrator {
    context: Arc<RecordContext>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    max_filename_len: usize,
    interrupted: Arc<AtomicBool>,
    progress: Option<ProgressBar>,
}

impl DownloadOrchestrator {
    /// Creates an orchestrator writing into `output_dir` with up to
    /// `concurrency` records in flight.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is outside
    /// `1..=32`.
    #[instrument(level = "debug", skip(fetcher, gate), fields(output_dir = %output_dir.display()))]
    pub fn new(
        fetcher: Fetcher,
        gate: Arc<PolitenessGate>,
        output_dir: PathBuf,
        concurrency: usize,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            delay_ms = fetcher.pacer().delay().as_millis(),
            "creating download orchestrator"
        );

        Ok(Self {
            context: Arc::new(RecordContext {
                fetcher,
                gate,
                output_dir,
            }),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            max_filename_len: DEFAULT_MAX_FILENAME_LEN,
            interrupted: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    /// Overrides the maximum derived filename length.
    #[must_use]
    pub fn with_max_filename_len(mut self, max_filename_len: usize) -> Self {
        self.max_filename_len = max_filename_len;
        self
    }

    /// Uses `interrupted` as the run-level cancellation flag.
    #[must_use]
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Advances `progress` by one for every finished record.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the directory documents are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.context.output_dir
    }

    /// Attempts every record once, in input order.
    ///
    /// The output directory is created if missing. A record's derived
    /// filename is claimed only after robots.txt allows the URL and a worker
    /// permit is held; later records mapping to a claimed name are treated as
    /// existing, so duplicate URLs are fetched once. A failed download gives
    /// its name back so a later record with the same name can still fill it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutputDir`] if the output directory cannot be
    /// created and [`EngineError::SemaphoreClosed`] if permit acquisition
    /// fails. Individual record failures do NOT cause this method to error.
    #[instrument(skip(self, records), fields(records = records.len(), output_dir = %self.output_dir().display()))]
    pub async fn run(&self, records: &[DiscoveredRecord]) -> Result<DownloadStats, EngineError> {
        tokio::fs::create_dir_all(self.output_dir())
            .await
            .map_err(|source| EngineError::OutputDir {
                path: self.output_dir().to_path_buf(),
                source,
            })?;

        let stats = Arc::new(DownloadStats::new());
        let claimed: Arc<DashSet<String>> = Arc::new(DashSet::new());
        let mut tasks = JoinSet::new();

        info!("starting downloads");

        for record in records {
            if self.interrupted.load(Ordering::SeqCst) {
                stats.set_interrupted();
                info!("interrupted; not scheduling remaining downloads");
                break;
            }

            let user_agent = self.context.fetcher.user_agent();
            if !self.context.gate.is_allowed(&record.url, user_agent).await {
                warn!(url = %record.url, "blocked by robots.txt");
                stats.record(RecordOutcome::SkippedRobots);
                self.tick();
                continue;
            }

            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            // Checked with the permit held so a finished failure has already
            // released its name.
            let filename = safe_filename(&record.url, self.max_filename_len);
            if !claimed.insert(filename.clone()) {
                debug!(url = %record.url, filename = %filename, "file already targeted earlier in this run");
                stats.record(RecordOutcome::SkippedExisting);
                self.tick();
                continue;
            }

            let context = Arc::clone(&self.context);
            let task_stats = Arc::clone(&stats);
            let task_claimed = Arc::clone(&claimed);
            let progress = self.progress.clone();
            let url = record.url.clone();
            tasks.spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;
                let outcome = process_record(&context, &url, &filename).await;
                if outcome == RecordOutcome::Failed {
                    task_claimed.remove(&filename);
                }
                task_stats.record(outcome);
                if let Some(progress) = progress {
                    progress.inc(1);
                }
            });

            // Reap finished tasks so the set does not grow with the input.
            while let Some(joined) = tasks.try_join_next() {
                log_join_failure(joined, &stats);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join_failure(joined, &stats);
        }

        if let Some(progress) = &self.progress {
            progress.finish();
        }

        info!(
            downloaded = stats.downloaded(),
            skipped_existing = stats.skipped_existing(),
            skipped_robots = stats.skipped_robots(),
            failed = stats.failed(),
            "downloads complete"
        );

        Ok(Arc::into_inner(stats).unwrap_or_default())
    }

    fn tick(&self) {
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
    }
}

fn log_join_failure(joined: Result<(), tokio::task::JoinError>, stats: &DownloadStats) {
    if let Err(e) = joined {
        error!(error = %e, "download task panicked");
        stats.record(RecordOutcome::Failed);
    }
}

/// Resume check, fetch, write. The robots gate has already allowed `url`.
async fn process_record(context: &RecordContext, url: &str, filename: &str) -> RecordOutcome {
    let path = context.output_dir.join(filename);
    if is_existing_non_empty(&path).await {
        debug!(url, path = %path.display(), "already downloaded; skipping");
        return RecordOutcome::SkippedExisting;
    }

    let bytes = match context.fetcher.get_bytes(url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(url, error = %e, "failed download");
            return RecordOutcome::Failed;
        }
    };

    match write_atomic(&path, &bytes).await {
        Ok(()) => {
            info!(url, path = %path.display(), bytes = bytes.len(), "downloaded");
            RecordOutcome::Downloaded
        }
        Err(e) => {
            error!(url, path = %path.display(), error = %e, "failed to write download");
            RecordOutcome::Failed
        }
    }
}
