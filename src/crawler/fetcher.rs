//! HTTP fetcher implementation
//!
//! This module handles every request made to the source, including:
//! - Building the HTTP client with fixed browser-like headers
//! - Spacing request starts through the shared politeness gate
//! - Retry with bounded exponential backoff for transient failures
//! - Error classification into retryable and terminal failures

use crate::config::FetcherConfig;
use crate::crawler::throttle::RateGate;
use crate::TransportError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_ZH: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// Retry settings derived from [`FetcherConfig`]
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

/// Outcome of a single request attempt
enum Attempt {
    Done(Vec<u8>),
    Retry {
        cause: String,
        retry_after: Option<Duration>,
    },
    Fatal(TransportError),
}

/// Polite HTTP client for the source
///
/// One `Fetcher` is shared by the whole run. Listing pages, detail pages and
/// cover images all pass through the same [`RateGate`].
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    gate: RateGate,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Builds a fetcher from configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Fetcher)` - Client built, gate armed
    /// * `Err(TransportError::Client)` - The underlying client could not be built
    pub fn new(config: &FetcherConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_ZH));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(TransportError::Client)?;

        let gate = RateGate::new(Duration::from_millis(config.politeness_interval_ms));
        tracing::debug!(
            "Fetcher ready: {:?} between requests, up to {} attempts",
            gate.interval(),
            config.max_attempts
        );

        Ok(Self {
            client,
            gate,
            policy: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                backoff_base: Duration::from_millis(config.backoff_base_ms),
                backoff_max: Duration::from_millis(config.backoff_max_ms),
            },
        })
    }

    /// Fetches a page and returns its body as text
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    pub async fn fetch(&self, url: &str) -> Result<String, TransportError> {
        let body = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Fetches a URL and returns the raw body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return body |
    /// | HTTP 429 | Retry, honoring Retry-After (capped at backoff max) |
    /// | HTTP 5xx | Retry with backoff |
    /// | Other HTTP status | Fail immediately |
    /// | Timeout / connection / body read error | Retry with backoff |
    /// | Malformed request | Fail immediately |
    ///
    /// Each attempt waits on the politeness gate first, so retries are
    /// spaced at least as far apart as fresh requests.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let mut last_cause = String::new();

        for attempt in 1..=self.policy.max_attempts {
            match self.attempt(url).await {
                Attempt::Done(body) => {
                    if attempt > 1 {
                        tracing::debug!("Fetched {} on attempt {}", url, attempt);
                    }
                    return Ok(body);
                }
                Attempt::Fatal(e) => return Err(e),
                Attempt::Retry { cause, retry_after } => {
                    if attempt < self.policy.max_attempts {
                        let delay = match retry_after {
                            Some(wait) => wait.min(self.policy.backoff_max),
                            None => backoff_delay(
                                attempt,
                                self.policy.backoff_base,
                                self.policy.backoff_max,
                            ),
                        };
                        tracing::warn!(
                            "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                            attempt,
                            self.policy.max_attempts,
                            url,
                            cause,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_cause = cause;
                }
            }
        }

        Err(TransportError::Exhausted {
            url: url.to_string(),
            attempts: self.policy.max_attempts,
            cause: last_cause,
        })
    }

    async fn attempt(&self, url: &str) -> Attempt {
        self.gate.acquire().await;

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Attempt::Fatal(TransportError::Request {
                    url: url.to_string(),
                    cause: e.to_string(),
                })
            }
            Err(e) => {
                let cause = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    e.to_string()
                };
                return Attempt::Retry {
                    cause,
                    retry_after: None,
                };
            }
        };

        let status = response.status();

        if status.is_success() {
            return match response.bytes().await {
                Ok(body) => Attempt::Done(body.to_vec()),
                Err(e) => Attempt::Retry {
                    cause: format!("body read failed: {}", e),
                    retry_after: None,
                },
            };
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);

            return Attempt::Retry {
                cause: format!("HTTP {}", status.as_u16()),
                retry_after,
            };
        }

        Attempt::Fatal(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Delay before retrying after the given (1-based) failed attempt
///
/// Doubles from `base` on every attempt and never exceeds `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(max)
}
