//! robots.txt compliance gate.
//!
//! [`PolitenessGate`] fetches each host's robots.txt once per run, caches the
//! resulting policy keyed by the robots.txt URL, and answers whether a URL may
//! be fetched under a given User-Agent. Rule matching uses the `robotstxt`
//! crate (a port of Google's matcher).
//!
//! How fetch outcomes map to policies:
//!
//! | robots.txt response        | policy                          |
//! |----------------------------|---------------------------------|
//! | 2xx                        | parsed rules                    |
//! | 401 / 403                  | disallow everything             |
//! | other 4xx (e.g. 404)       | allow everything                |
//! | 5xx or transport failure   | [`RobotsFallback`] (default allow) |
//!
//! Policies are never refreshed: one snapshot per host per run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use robotstxt::DefaultMatcher;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::RobotsFallback;
use crate::fetch::Fetcher;
use crate::user_agent::product_token;

/// Result of checking a URL against robots.txt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsDecision {
    /// URL may be fetched.
    Allowed,
    /// URL is disallowed by robots.txt (or by a fail-closed fallback).
    Disallowed,
}

impl RobotsDecision {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Self::Allowed
    }
}

/// Cached robots.txt policy for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RobotsPolicy {
    AllowAll,
    DisallowAll,
    Rules(String),
}

impl RobotsPolicy {
    fn from_fallback(fallback: RobotsFallback) -> Self {
        match fallback {
            RobotsFallback::Allow => Self::AllowAll,
            RobotsFallback::Deny => Self::DisallowAll,
        }
    }

    fn can_fetch(&self, user_agent: &str, url: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::DisallowAll => false,
            Self::Rules(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, product_token(user_agent), url)
            }
        }
    }
}

/// Per-host robots.txt cache and permission check.
///
/// Construct one per run and share it by reference (or `Arc`) between the
/// orchestrators. Concurrent first queries for the same host wait on a
/// single robots.txt fetch.
#[derive(Debug)]
pub struct PolitenessGate {
    fetcher: Fetcher,
    fallback: RobotsFallback,
    policies: DashMap<String, Arc<OnceCell<RobotsPolicy>>>,
    fetches: AtomicUsize,
}

impl PolitenessGate {
    /// Creates a gate that fetches robots.txt through `fetcher`.
    #[must_use]
    pub fn new(fetcher: Fetcher, fallback: RobotsFallback) -> Self {
        Self {
            fetcher,
            fallback,
            policies: DashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// The policy applied when robots.txt cannot be read.
    #[must_use]
    pub fn fallback(&self) -> RobotsFallback {
        self.fallback
    }

    /// Number of robots.txt fetch attempts made so far.
    #[must_use]
    pub fn robots_fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of hosts with a cached policy.
    #[must_use]
    pub fn cached_hosts(&self) -> usize {
        self.policies.len()
    }

    /// Returns whether `url` may be fetched under `user_agent`.
    pub async fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.check(url, user_agent).await.is_allowed()
    }

    /// Checks `url` against its host's robots.txt, fetching it on first use.
    ///
    /// URLs without a usable scheme and host are disallowed.
    #[instrument(skip(self, user_agent), fields(url = %url))]
    pub async fn check(&self, url: &str, user_agent: &str) -> RobotsDecision {
        let Some(robots_url) = robots_url_for(url) else {
            debug!("no robots.txt location for URL; disallowing");
            return RobotsDecision::Disallowed;
        };

        // Clone the cell out so the map shard lock is not held across the fetch.
        let cell = self
            .policies
            .entry(robots_url.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let policy = cell
            .get_or_init(|| self.load_policy(&robots_url))
            .await;

        if policy.can_fetch(user_agent, url) {
            RobotsDecision::Allowed
        } else {
            debug!(robots_url = %robots_url, "robots.txt disallows URL");
            RobotsDecision::Disallowed
        }
    }

    async fn load_policy(&self, robots_url: &str) -> RobotsPolicy {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        match self.fetcher.get_raw(robots_url).await {
            Ok((status, body)) if (200..300).contains(&status) => {
                debug!(robots_url, bytes = body.len(), "loaded robots.txt");
                RobotsPolicy::Rules(body)
            }
            Ok((401 | 403, _)) => {
                debug!(robots_url, "robots.txt access denied; disallowing host");
                RobotsPolicy::DisallowAll
            }
            Ok((status, _)) if (400..500).contains(&status) => {
                debug!(robots_url, status, "no robots.txt; allowing host");
                RobotsPolicy::AllowAll
            }
            Ok((status, _)) => {
                warn!(
                    robots_url,
                    status,
                    fallback = self.fallback.as_str(),
                    "robots.txt unavailable; applying fallback policy"
                );
                RobotsPolicy::from_fallback(self.fallback)
            }
            Err(e) => {
                warn!(
                    robots_url,
                    error = %e,
                    fallback = self.fallback.as_str(),
                    "failed to fetch robots.txt; applying fallback policy"
                );
                RobotsPolicy::from_fallback(self.fallback)
            }
        }
    }
}

/// Builds the robots.txt URL (`{scheme}://{host[:port]}/robots.txt`) for a URL.
#[must_use]
pub fn robots_url_for(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let scheme = parsed.scheme();
    let host = parsed.host_str()?;
    let robots_url = if let Some(port) = parsed.port() {
        format!("{scheme}://{host}:{port}/robots.txt")
    } else {
        format!("{scheme}://{host}/robots.txt")
    };
    Some(robots_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robots_url_for() {
        assert_eq!(
            robots_url_for("https://example.gov/path/doc.pdf"),
            Some("https://example.gov/robots.txt".to_string())
        );
        assert_eq!(
            robots_url_for("http://localhost:8080/file"),
            Some("http://localhost:8080/robots.txt".to_string())
        );
    }

    #[test]
    fn test_robots_url_for_strips_query_and_fragment() {
        assert_eq!(
            robots_url_for("https://example.gov/path?query=1#frag"),
            Some("https://example.gov/robots.txt".to_string())
        );
    }

    #[test]
    fn test_robots_url_for_rejects_unusable_urls() {
        assert_eq!(robots_url_for("not_a_valid_url"), None);
        assert_eq!(robots_url_for("mailto:someone@example.gov"), None);
        assert_eq!(robots_url_for("ftp://example.gov/file.pdf"), None);
    }

    #[test]
    fn test_policy_rules_match_wildcard_group() {
        let policy = RobotsPolicy::Rules("User-agent: *\nDisallow: /private/\n".to_string());
        assert!(policy.can_fetch("govcrawl/0.1", "https://a.gov/public/x.pdf"));
        assert!(!policy.can_fetch("govcrawl/0.1", "https://a.gov/private/x.pdf"));
    }

    #[test]
    fn test_policy_rules_match_product_token_group() {
        let body = "User-agent: govcrawl\nDisallow: /reports/\n\nUser-agent: *\nDisallow:\n";
        let policy = RobotsPolicy::Rules(body.to_string());
        assert!(!policy.can_fetch(
            "govcrawl/0.1.0 (academic-research-tool)",
            "https://a.gov/reports/r.pdf"
        ));
        assert!(policy.can_fetch("OtherBot/2.0", "https://a.gov/reports/r.pdf"));
    }

    #[test]
    fn test_policy_empty_rules_allow_everything() {
        let policy = RobotsPolicy::Rules(String::new());
        assert!(policy.can_fetch("govcrawl", "https://a.gov/anything"));
    }

    #[test]
    fn test_policy_from_fallback() {
        assert_eq!(
            RobotsPolicy::from_fallback(RobotsFallback::Allow),
            RobotsPolicy::AllowAll
        );
        assert_eq!(
            RobotsPolicy::from_fallback(RobotsFallback::Deny),
            RobotsPolicy::DisallowAll
        );
        assert!(!RobotsPolicy::DisallowAll.can_fetch("govcrawl", "https://a.gov/"));
    }
}
