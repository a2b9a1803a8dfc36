//! Global request pacing.
//!
//! [`Pacer`] enforces a minimum gap between outbound requests made through one
//! [`Fetcher`](super::Fetcher). There is a single clock shared by every host:
//! a request to `b.gov` waits on a request to `a.gov` just the same.
//!
//! The clock tracks the later of two moments: when the last request was
//! allowed to start, and when the last request completed. Sequential callers
//! therefore see `delay` between one response and the next request, and
//! concurrent callers can never start two requests closer than `delay`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use govcrawl::fetch::Pacer;
//!
//! # async fn example() {
//! let pacer = Pacer::new(Duration::from_secs(1));
//!
//! // First request proceeds immediately
//! pacer.acquire().await;
//! pacer.record_completion().await;
//!
//! // Second request waits out the rest of the delay
//! pacer.acquire().await;
//! pacer.record_completion().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::CUMULATIVE_DELAY_WARNING_THRESHOLD;

/// Mutex-guarded pacing clock.
///
/// `Pacer` is `Send + Sync` and is shared through the owning `Fetcher`'s `Arc`.
#[derive(Debug)]
pub struct Pacer {
    /// Minimum delay between requests.
    delay: Duration,

    /// Time of the last request start or completion, whichever is later.
    /// `None` until the first request: the first call is never delayed.
    last_request: Mutex<Option<Instant>>,

    /// Total time spent waiting, in milliseconds.
    cumulative_delay_ms: AtomicU64,
}

impl Pacer {
    /// Creates a pacer enforcing `delay` between requests.
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = delay.as_millis()))]
    pub fn new(delay: Duration) -> Self {
        debug!("creating request pacer");
        Self {
            delay,
            last_request: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Creates a pacer that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns the configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.delay.is_zero()
    }

    /// Total time callers have spent waiting on this pacer.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::SeqCst))
    }

    /// Waits until a request may start, then reserves the slot.
    ///
    /// The lock is held across the sleep so concurrent callers queue up
    /// behind each other instead of all waking at the same instant.
    pub async fn acquire(&self) {
        if self.is_disabled() {
            return;
        }

        let mut last_request = self.last_request.lock().await;

        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                let wait = self.delay.saturating_sub(elapsed);
                let cumulative = self.add_cumulative_delay(wait);

                debug!(
                    wait_ms = wait.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "pacing request"
                );

                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD
                    && cumulative.saturating_sub(wait) < CUMULATIVE_DELAY_WARNING_THRESHOLD
                {
                    warn!(
                        cumulative_delay_secs = cumulative.as_secs(),
                        "crawl has spent a long time waiting on the request delay"
                    );
                }

                tokio::time::sleep(wait).await;
            }
        } else {
            debug!("first request - no delay");
        }

        *last_request = Some(Instant::now());
    }

    /// Records that a request has completed (successfully or not).
    ///
    /// Never moves the clock backwards.
    pub async fn record_completion(&self) {
        if self.is_disabled() {
            return;
        }

        let now = Instant::now();
        let mut last_request = self.last_request.lock().await;
        *last_request = Some(last_request.map_or(now, |last| last.max(now)));
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_pacer_new_keeps_delay() {
        let pacer = Pacer::new(Duration::from_millis(500));
        assert_eq!(pacer.delay(), Duration::from_millis(500));
        assert!(!pacer.is_disabled());
    }

    #[test]
    fn test_pacer_disabled_has_zero_delay() {
        let pacer = Pacer::disabled();
        assert_eq!(pacer.delay(), Duration::ZERO);
        assert!(pacer.is_disabled());
    }

    #[tokio::test]
    async fn test_disabled_pacer_never_waits() {
        tokio::time::pause();

        let pacer = Pacer::disabled();
        let start = Instant::now();
        for _ in 0..3 {
            pacer.acquire().await;
            pacer.record_completion().await;
        }

        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        tokio::time::pause();

        let pacer = Pacer::new(Duration::from_secs(3));
        let start = Instant::now();
        pacer.acquire().await;

        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_second_request_waits_full_delay() {
        tokio::time::pause();

        let pacer = Pacer::new(Duration::from_secs(1));
        let start = Instant::now();

        pacer.acquire().await;
        pacer.record_completion().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1100));
        pacer.record_completion().await;

        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_delay_measured_from_completion() {
        tokio::time::pause();

        let pacer = Pacer::new(Duration::from_secs(1));
        pacer.acquire().await;
        // A slow response: completes 5 seconds after it started.
        tokio::time::advance(Duration::from_secs(5)).await;
        pacer.record_completion().await;

        let completed_at = Instant::now();
        pacer.acquire().await;
        assert!(completed_at.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_elapsed_time_counts_toward_delay() {
        tokio::time::pause();

        let pacer = Pacer::new(Duration::from_secs(2));
        pacer.acquire().await;
        pacer.record_completion().await;

        tokio::time::advance(Duration::from_millis(1500)).await;
        let start = Instant::now();
        pacer.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_concurrent_acquires_are_spaced_globally() {
        tokio::time::pause();

        let pacer = Arc::new(Pacer::new(Duration::from_secs(1)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let pacer = Arc::clone(&pacer);
            handles.push(tokio::spawn(async move {
                pacer.acquire().await;
                Instant::now()
            }));
        }

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap());
        }
        starts.sort();

        assert!(starts[1].duration_since(starts[0]) >= Duration::from_secs(1));
        assert!(starts[2].duration_since(starts[1]) >= Duration::from_secs(1));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cumulative_delay_accumulates() {
        tokio::time::pause();

        let pacer = Pacer::new(Duration::from_secs(1));
        pacer.acquire().await;
        pacer.acquire().await;
        pacer.acquire().await;

        assert!(pacer.cumulative_delay() >= Duration::from_millis(1900));
    }
}
