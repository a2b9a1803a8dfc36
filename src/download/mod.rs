//! Document download phase.
//!
//! Takes the discovered records produced by discovery and stores each
//! document under a filename derived from its URL.
//!
//! # Features
//!
//! - Idempotent resume: existing non-empty files are never fetched again
//! - Atomic writes (no partially written file is ever visible under the final name)
//! - Per-record failure isolation
//! - Optional bounded worker pool sharing the global pacing clock
//!
//! # Example
//!
//! ```
//! use govcrawl::download::safe_filename;
//!
//! assert_eq!(safe_filename("https://a.gov/reports/x.pdf", 120), "x.pdf");
//! assert_eq!(safe_filename("https://a.gov/reports/", 120), "reports.pdf");
//! ```

mod engine;
pub mod filename;
pub mod storage;

pub use engine::{DownloadOrchestrator, DownloadStats, EngineError, MAX_CONCURRENCY};
pub use filename::{safe_filename, sanitize_filename_component, url_fingerprint};
