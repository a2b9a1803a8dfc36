//! Shared User-Agent string for crawl traffic.
//!
//! Seed pages, robots.txt and document downloads all go out under the same
//! identifying header so site operators can recognise and contact the crawler.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/govcrawl";

/// Default User-Agent for every crawl request.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("govcrawl/{version} (academic-research-tool; +{PROJECT_UA_URL})")
}

/// Returns the product token robots.txt groups are matched against.
///
/// `govcrawl/0.1.0 (...)` yields `govcrawl`. Falls back to the trimmed input
/// when there is no version separator.
#[must_use]
pub fn product_token(user_agent: &str) -> &str {
    let trimmed = user_agent.trim();
    let end = trimmed
        .find(|c: char| c == '/' || c.is_whitespace())
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}
