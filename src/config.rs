//! Run configuration shared by the discovery and download phases.

use std::path::PathBuf;
use std::time::Duration;

use crate::user_agent::default_user_agent;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default minimum delay between requests.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// Default maximum length of a derived download filename.
pub const DEFAULT_MAX_FILENAME_LEN: usize = 120;

/// Default download worker count (sequential).
pub const DEFAULT_CONCURRENCY: usize = 1;

/// What the politeness gate decides when a host's robots.txt cannot be read.
///
/// `Allow` is the research-tool default. Stricter deployments should use
/// `Deny` so unreachable robots.txt blocks the whole host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RobotsFallback {
    /// Treat the host as unrestricted.
    #[default]
    Allow,
    /// Treat the host as fully disallowed.
    Deny,
}

impl RobotsFallback {
    /// Stable label used in config files and CLI flags.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }

    /// Parses `allow` / `deny` (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }
}

/// Everything a crawl run needs: identity, pacing and file locations.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Identifying User-Agent header sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum gap between successive requests (zero disables pacing).
    pub delay: Duration,
    /// Root directory for captured seed pages and downloaded documents.
    pub out_dir: PathBuf,
    /// Seed record CSV read by discovery.
    pub sources_csv: PathBuf,
    /// Discovered record CSV written by discovery and read by download.
    pub discovered_csv: PathBuf,
    /// Optional log file mirrored alongside stderr.
    pub log_file: Option<PathBuf>,
    /// Decision used when robots.txt cannot be fetched.
    pub robots_fallback: RobotsFallback,
    /// Maximum length of a derived download filename.
    pub max_filename_len: usize,
    /// Number of concurrent download workers.
    pub concurrency: usize,
    /// Whether discovery keeps a copy of each fetched seed page.
    pub save_seed_pages: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            delay: DEFAULT_DELAY,
            out_dir: PathBuf::from("data/raw"),
            sources_csv: PathBuf::from("data/sources/sources.csv"),
            discovered_csv: PathBuf::from("data/sources/discovered_links.csv"),
            log_file: Some(PathBuf::from("data/logs/scraper.log")),
            robots_fallback: RobotsFallback::default(),
            max_filename_len: DEFAULT_MAX_FILENAME_LEN,
            concurrency: DEFAULT_CONCURRENCY,
            save_seed_pages: true,
        }
    }
}

impl CrawlConfig {
    /// Directory holding raw seed page captures.
    #[must_use]
    pub fn html_dir(&self) -> PathBuf {
        self.out_dir.join("html")
    }

    /// Directory holding downloaded documents.
    #[must_use]
    pub fn pdf_dir(&self) -> PathBuf {
        self.out_dir.join("pdfs")
    }
}
