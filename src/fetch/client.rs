//! Paced HTTP client for seed pages, robots.txt and document downloads.
//!
//! This module provides the [`Fetcher`] which wraps one `reqwest::Client`
//! together with the run's [`Pacer`], so every request made during a run
//! shares the same connection pool, identifying User-Agent, timeout and
//! pacing clock.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response};
use tracing::{debug, instrument};
use url::Url;

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::FetchError;
use super::pacing::Pacer;
use crate::config::CrawlConfig;

/// HTTP client enforcing a global minimum delay between requests.
///
/// Cloning a `Fetcher` is cheap and every clone shares the same pacing
/// clock, which makes it safe to hand to concurrent download workers.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use govcrawl::fetch::Fetcher;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = Fetcher::new("MyBot/1.0", Duration::from_secs(30), Duration::from_secs(3))?;
/// let html = fetcher.get_text("https://example.gov/reports").await?;
/// println!("fetched {} bytes", html.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    pacer: Arc<Pacer>,
    user_agent: String,
}

impl Fetcher {
    /// Creates a fetcher with an identifying User-Agent, a per-request
    /// timeout, and a minimum delay between requests.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest::Error` if the HTTP client cannot be
    /// built (for example when the TLS backend fails to initialise).
    #[instrument(level = "debug", skip(user_agent), fields(timeout_ms = timeout.as_millis(), delay_ms = delay.as_millis()))]
    pub fn new(
        user_agent: impl Into<String>,
        timeout: Duration,
        delay: Duration,
    ) -> Result<Self, reqwest::Error> {
        let user_agent = user_agent.into();
        let client = base_client_builder(&user_agent, timeout).build()?;
        debug!("created fetcher");
        Ok(Self {
            client,
            pacer: Arc::new(Pacer::new(delay)),
            user_agent,
        })
    }

    /// Creates a fetcher from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest::Error` if the HTTP client cannot be built.
    pub fn from_config(config: &CrawlConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.user_agent.clone(), config.timeout, config.delay)
    }

    /// The User-Agent header sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The pacing clock shared by every clone of this fetcher.
    #[must_use]
    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Fetches a page and returns its body decoded as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::HttpStatus`] for 4xx/5xx responses,
    /// [`FetchError::Timeout`] or [`FetchError::Network`] for transport
    /// failures, and [`FetchError::InvalidUrl`] for unusable URLs.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.send_checked(url).await?;
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::transport(url, e));
        self.pacer.record_completion().await;
        text
    }

    /// Fetches a resource and returns its raw body.
    ///
    /// # Errors
    ///
    /// Same as [`get_text`](Self::get_text).
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.send_checked(url).await?;
        let bytes = response
            .bytes()
            .await
            .map(Vec::from)
            .map_err(|e| FetchError::transport(url, e));
        self.pacer.record_completion().await;
        bytes
    }

    /// Fetches a URL and returns the status code with the text body, without
    /// turning error statuses into errors.
    ///
    /// Used for robots.txt, where 4xx responses carry meaning of their own.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] or [`FetchError::Network`] for
    /// transport failures and [`FetchError::InvalidUrl`] for unusable URLs.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_raw(&self, url: &str) -> Result<(u16, String), FetchError> {
        let response = self.send(url).await?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::transport(url, e));
        self.pacer.record_completion().await;
        Ok((status, body?))
    }

    async fn send_checked(&self, url: &str) -> Result<Response, FetchError> {
        let response = self.send(url).await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            self.pacer.record_completion().await;
            return Err(FetchError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Waits for the pacing slot and issues the GET.
    ///
    /// On transport failure the completion is recorded here; on success the
    /// caller records it once the body has been read.
    async fn send(&self, url: &str) -> Result<Response, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url));
        }

        self.pacer.acquire().await;
        debug!("sending request");

        match self.client.get(parsed).send().await {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "received response");
                Ok(response)
            }
            Err(e) => {
                self.pacer.record_completion().await;
                Err(FetchError::transport(url, e))
            }
        }
    }
}

fn base_client_builder(user_agent: &str, timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .timeout(timeout)
        .gzip(true)
        .user_agent(user_agent)
}
