//! Outbound HTTP behind a narrow trait, plus exponential backoff for the
//! fetches whose failure would sink a whole run.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: GET a document as text, HEAD-probe a URL
//! - [`HttpFetcher`]: the `reqwest` implementation with a fixed desktop UA
//! - [`fetch_with_backoff`]: retry wrapper for run-level documents
//!
//! # Retry Strategy
//!
//! Only listing pages and root sitemaps are retried. Per-item fetches (deep
//! pages, child sitemaps, probes) degrade immediately instead, so a bad
//! origin costs one request per item and no more.
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use rand::{Rng, rng};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Outbound HTTP as seen by the extractors.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return the body. Non-2xx statuses are errors.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// HEAD `url` and return the status code.
    async fn probe(&self, url: &str) -> Result<u16>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    document_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            document_timeout: config.document_timeout(),
            probe_timeout: config.probe_timeout(),
        })
    }
}

fn network_error(url: &str, e: reqwest::Error) -> Error {
    Error::Network {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get_text(&self, url: &str) -> Result<String> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .timeout(self.document_timeout)
            .send()
            .await
            .map_err(|e| network_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| network_error(url, e))?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched document"
        );
        Ok(body)
    }

    #[instrument(level = "debug", skip(self))]
    async fn probe(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| network_error(url, e))?;
        Ok(response.status().as_u16())
    }
}

/// Backoff parameters for [`fetch_with_backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first failure.
    pub max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    pub base_delay: Duration,
    /// Cap applied before jitter.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

/// GET a run-level document, retrying with exponential backoff and jitter.
#[instrument(level = "info", skip(fetcher, policy))]
pub async fn fetch_with_backoff(
    fetcher: &dyn PageFetcher,
    url: &str,
    policy: RetryPolicy,
) -> Result<String> {
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        match fetcher.get_text(url).await {
            Ok(body) => {
                if attempt > 0 {
                    info!(attempt, "Fetch succeeded after retrying");
                }
                return Ok(body);
            }
            Err(e) => {
                attempt += 1;
                let total_dt = total_t0.elapsed();

                if attempt > policy.max_retries {
                    error!(
                        attempt,
                        max = policy.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        error = %e,
                        "Fetch exhausted retries"
                    );
                    return Err(e);
                }

                let jitter_ms: u64 = if policy.base_delay.is_zero() {
                    0
                } else {
                    rng().random_range(0..=250)
                };
                let delay = policy.backoff(attempt) + Duration::from_millis(jitter_ms);

                warn!(
                    attempt,
                    max = policy.max_retries,
                    elapsed_ms_total = total_dt.as_millis() as u64,
                    ?delay,
                    error = %e,
                    "Fetch failed; backing off"
                );
                sleep(delay).await;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StubFetcher;
    use super::*;

    fn instant_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(6), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_fetch_with_backoff_returns_body() {
        let fetcher = StubFetcher::new().with_page("https://example.com/", "<html></html>");
        let body = fetch_with_backoff(&fetcher, "https://example.com/", instant_policy(2))
            .await
            .unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_with_backoff_gives_up_after_retries() {
        let fetcher = StubFetcher::new();
        let result = fetch_with_backoff(&fetcher, "https://down.example/", instant_policy(2)).await;
        assert!(matches!(result, Err(Error::Network { .. })));
        assert_eq!(fetcher.request_count(), 3);
    }
}
