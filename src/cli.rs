//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use govcrawl::{CrawlConfig, RobotsFallback};

use crate::app_config::{delay_from_secs, validate_delay_secs};

/// Polite two-phase document crawler.
///
/// `discover` visits the seed pages listed in the sources CSV and records
/// every linked PDF; `download` fetches the recorded documents, skipping
/// files already on disk. Both phases honor robots.txt and keep a fixed
/// minimum delay between requests.
#[derive(Parser, Debug)]
#[command(name = "govcrawl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/govcrawl/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User-Agent sent with every request
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Minimum delay between requests in seconds (0 disables pacing)
    #[arg(long, global = true, value_parser = parse_delay_secs)]
    pub delay: Option<f64>,

    /// Request timeout in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Root directory for seed page captures and downloads
    #[arg(long, global = true)]
    pub out_dir: Option<PathBuf>,

    /// Decision when a host's robots.txt cannot be fetched
    #[arg(long, global = true, value_parser = parse_robots_fallback)]
    pub robots_fallback: Option<RobotsFallback>,

    /// Mirror log output to this file
    #[arg(long, global = true, conflicts_with = "no_log_file")]
    pub log_file: Option<PathBuf>,

    /// Log to stderr only
    #[arg(long, global = true)]
    pub no_log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Visit seed pages and record the document links they contain
    Discover {
        /// Seed CSV (source_id,org,doc_type,seed_url)
        #[arg(long)]
        sources: Option<PathBuf>,

        /// Output CSV of discovered document links
        #[arg(long)]
        discovered: Option<PathBuf>,

        /// Do not keep a copy of each fetched seed page
        #[arg(long)]
        no_save_pages: bool,
    },

    /// Download every document listed in the discovered CSV
    Download {
        /// Discovered CSV produced by `discover`
        #[arg(long)]
        discovered: Option<PathBuf>,

        /// Concurrent download workers (1-32)
        #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
        concurrency: Option<u8>,

        /// Maximum length of a derived filename (20-255)
        #[arg(long, value_parser = clap::value_parser!(u16).range(20..=255))]
        max_filename_len: Option<u16>,
    },
}

impl Args {
    /// Writes every flag given on the command line onto `config`.
    pub fn apply_to(&self, config: &mut CrawlConfig) -> Result<()> {
        if let Some(user_agent) = &self.user_agent {
            config.user_agent.clone_from(user_agent);
        }
        if let Some(delay) = self.delay {
            config.delay = delay_from_secs(delay)?;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Duration::from_secs(timeout);
        }
        if let Some(out_dir) = &self.out_dir {
            config.out_dir.clone_from(out_dir);
        }
        if let Some(fallback) = self.robots_fallback {
            config.robots_fallback = fallback;
        }
        if self.no_log_file {
            config.log_file = None;
        } else if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }

        match &self.command {
            Command::Discover {
                sources,
                discovered,
                no_save_pages,
            } => {
                if let Some(sources) = sources {
                    config.sources_csv.clone_from(sources);
                }
                if let Some(discovered) = discovered {
                    config.discovered_csv.clone_from(discovered);
                }
                if *no_save_pages {
                    config.save_seed_pages = false;
                }
            }
            Command::Download {
                discovered,
                concurrency,
                max_filename_len,
            } => {
                if let Some(discovered) = discovered {
                    config.discovered_csv.clone_from(discovered);
                }
                if let Some(concurrency) = concurrency {
                    config.concurrency = usize::from(*concurrency);
                }
                if let Some(len) = max_filename_len {
                    config.max_filename_len = usize::from(*len);
                }
            }
        }
        Ok(())
    }
}

fn parse_delay_secs(raw: &str) -> Result<f64, String> {
    let delay = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid number '{raw}': {e}"))?;
    validate_delay_secs(delay).map_err(|e| e.to_string())?;
    Ok(delay)
}

fn parse_robots_fallback(raw: &str) -> Result<RobotsFallback, String> {
    RobotsFallback::parse(raw).ok_or_else(|| format!("expected 'allow' or 'deny', got '{raw}'"))
}
