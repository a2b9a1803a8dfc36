//! Rate-limited HTTP fetching.
//!
//! All crawl traffic goes through one [`Fetcher`] per run. It applies the
//! identifying User-Agent and request timeout to every call and spaces
//! requests at least `delay` apart using a single shared [`Pacer`].
//!
//! # Features
//!
//! - Text bodies for HTML pages ([`Fetcher::get_text`])
//! - Raw bodies for binary downloads ([`Fetcher::get_bytes`])
//! - Status-preserving fetch for robots.txt ([`Fetcher::get_raw`])
//! - Typed failures distinguishing HTTP status from transport errors

mod client;
mod constants;
mod error;
pub mod pacing;

pub use client::Fetcher;
pub use error::FetchError;
pub use pacing::Pacer;
