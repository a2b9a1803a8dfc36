//! Discovery phase: seed pages in, document links out.
//!
//! For every seed the [`DiscoveryOrchestrator`] checks robots.txt, fetches the
//! page, optionally keeps a raw copy, extracts and classifies its links, and
//! appends each document link not yet seen in this run. A seed whose URL is
//! not an http(s) URL, is blocked, or fails to fetch is logged and skipped;
//! the run always finishes with whatever was found.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, instrument, warn};

use crate::download::sanitize_filename_component;
use crate::download::storage::write_atomic;
use crate::extract::{ClassifiedLinks, classify, extract_links};
use crate::fetch::Fetcher;
use crate::records::{DiscoveredRecord, SeedRecord};
use crate::robots::{PolitenessGate, robots_url_for};

/// Outcome of a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Discovered document records, unique by URL, in discovery order.
    pub records: Vec<DiscoveredRecord>,
    /// Seeds fetched and scanned.
    pub seeds_scanned: usize,
    /// Seeds skipped because `seed_url` is empty or not an http(s) URL.
    pub seeds_invalid: usize,
    /// Seeds skipped because robots.txt disallows them.
    pub seeds_skipped_robots: usize,
    /// Seeds whose page could not be fetched.
    pub seeds_failed: usize,
    /// Whether the run stopped before visiting every seed.
    pub interrupted: bool,
}

/// Visits seed pages and collects document links.
#[derive(Debug)]
pub struct DiscoveryOrchestrator {
    fetcher: Fetcher,
    gate: Arc<PolitenessGate>,
    page_dir: Option<PathBuf>,
    interrupted: Arc<AtomicBool>,
}

impl DiscoveryOrchestrator {
    #[must_use]
    pub fn new(fetcher: Fetcher, gate: Arc<PolitenessGate>) -> Self {
        Self {
            fetcher,
            gate,
            page_dir: None,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Keeps a verbatim copy of each fetched seed page in `page_dir`.
    #[must_use]
    pub fn with_page_dir(mut self, page_dir: PathBuf) -> Self {
        self.page_dir = Some(page_dir);
        self
    }

    /// Uses `interrupted` as the run-level cancellation flag.
    #[must_use]
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Processes every seed in order and returns the deduplicated records.
    #[instrument(skip(self, seeds), fields(seeds = seeds.len()))]
    pub async fn run(&self, seeds: &[SeedRecord]) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        for seed in seeds {
            if self.interrupted.load(Ordering::SeqCst) {
                info!("interrupted; not visiting remaining seeds");
                report.interrupted = true;
                break;
            }

            let seed_url = seed.seed_url.as_str();
            info!(seed_url, "seed");

            if robots_url_for(seed_url).is_none() {
                warn!(seed_url, source_id = %seed.source_id, "invalid seed URL; skipping");
                report.seeds_invalid += 1;
                continue;
            }

            if !self.gate.is_allowed(seed_url, self.fetcher.user_agent()).await {
                warn!(seed_url, "blocked by robots.txt");
                report.seeds_skipped_robots += 1;
                continue;
            }

            let html = match self.fetcher.get_text(seed_url).await {
                Ok(html) => html,
                Err(e) => {
                    error!(seed_url, error = %e, "failed to fetch seed");
                    report.seeds_failed += 1;
                    continue;
                }
            };

            if let Some(page_dir) = &self.page_dir {
                save_seed_page(page_dir, seed, &html).await;
            }

            let ClassifiedLinks { documents, other } = classify(extract_links(&html, seed_url));
            info!(
                seed_url,
                documents = documents.len(),
                other = other.len(),
                "classified links on seed page"
            );

            for url in documents {
                if seen.insert(url.clone()) {
                    report.records.push(DiscoveredRecord::from_seed(seed, url));
                }
            }
            report.seeds_scanned += 1;
        }

        info!(
            discovered = report.records.len(),
            scanned = report.seeds_scanned,
            invalid = report.seeds_invalid,
            skipped_robots = report.seeds_skipped_robots,
            failed = report.seeds_failed,
            "discovery complete"
        );
        report
    }
}

/// File name used for a seed's raw page capture.
#[must_use]
pub fn seed_page_filename(seed: &SeedRecord) -> String {
    let id = sanitize_filename_component(&seed.source_id);
    let id = id.trim_matches('.');
    if id.is_empty() {
        "seed_page.html".to_string()
    } else {
        format!("{id}_page.html")
    }
}

async fn save_seed_page(page_dir: &Path, seed: &SeedRecord, html: &str) {
    let path = page_dir.join(seed_page_filename(seed));
    let result = match tokio::fs::create_dir_all(page_dir).await {
        Ok(()) => write_atomic(&path, html.as_bytes()).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "failed to save seed page");
    }
}
