//! govcrawl core library
//!
//! A polite, two-phase crawler. Discovery visits seed pages and collects
//! links to documents; download fetches those documents to disk, skipping
//! anything already retrieved.
//!
//! # Architecture
//!
//! The library is organized into the following modules, leaf-first:
//! - [`fetch`] - HTTP client with a global minimum delay between requests
//! - [`robots`] - Per-host robots.txt cache and permission check
//! - [`extract`] - Link extraction, deduplication and document classification
//! - [`records`] - Seed and discovered record CSV files
//! - [`discover`] - Discovery orchestrator
//! - [`download`] - Download orchestrator, filename derivation, atomic writes
//! - [`pipeline`] - Phase entry points used by the CLI
//! - [`config`] - Run configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod discover;
pub mod download;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod records;
pub mod robots;
pub mod user_agent;

// Re-export commonly used types
pub use config::{CrawlConfig, RobotsFallback};
pub use discover::{DiscoveryOrchestrator, DiscoveryReport};
pub use download::{DownloadOrchestrator, DownloadStats, EngineError, safe_filename};
pub use extract::{ClassifiedLinks, classify, extract_links, is_document_link};
pub use fetch::{FetchError, Fetcher, Pacer};
pub use pipeline::{PipelineError, RunOptions, run_discovery, run_download};
pub use records::{DiscoveredRecord, RecordError, SeedRecord};
pub use robots::{PolitenessGate, RobotsDecision, robots_url_for};
