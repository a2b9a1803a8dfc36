//! Link extraction and document classification.
//!
//! Anchors are pulled out of an HTML page with `scraper`, resolved against the
//! page URL with WHATWG rules, and deduplicated in first-seen order so
//! downstream output is deterministic.
//!
//! Classification is a suffix heuristic: a link is a document when its
//! lowercased URL, with query and fragment removed, ends in `.pdf`. Documents
//! served from URLs without that suffix are classified as other links; the
//! response `Content-Type` is never consulted.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

/// Suffix marking a link as a document.
pub const DOCUMENT_SUFFIX: &str = ".pdf";

#[allow(clippy::expect_used)]
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector is valid"));

/// Links on a page split by target type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedLinks {
    /// Links that look like downloadable documents.
    pub documents: Vec<String>,
    /// Everything else (HTML pages, images, mailto targets, ...).
    pub other: Vec<String>,
}

/// Extracts every anchor target from `html` as an absolute URL.
///
/// Empty or whitespace-only hrefs are ignored, as are hrefs that cannot be
/// resolved against `base_url`. Duplicates are dropped keeping the first
/// occurrence. An unparseable `base_url` yields no links.
#[must_use]
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        warn!(base_url, "invalid base URL; no links extracted");
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let resolved = document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| base.join(href).ok())
        .map(String::from);

    dedup_preserving_order(resolved)
}

/// Splits links into documents and other links, preserving input order.
#[must_use]
pub fn classify<I, S>(links: I) -> ClassifiedLinks
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut classified = ClassifiedLinks::default();
    for link in links {
        let link = link.into();
        if is_document_link(&link) {
            classified.documents.push(link);
        } else {
            classified.other.push(link);
        }
    }
    classified
}

/// Returns whether a URL looks like a document link.
///
/// Case-insensitive; anything after the first `?` or `#` is ignored.
#[must_use]
pub fn is_document_link(url: &str) -> bool {
    let lowered = url.to_lowercase();
    let without_query = lowered.split('?').next().unwrap_or_default();
    let without_fragment = without_query.split('#').next().unwrap_or_default();
    without_fragment.ends_with(DOCUMENT_SUFFIX)
}

fn dedup_preserving_order(links: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links.filter(|link| seen.insert(link.clone())).collect()
}
