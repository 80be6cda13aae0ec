// Retry logic with exponential backoff, and the fetcher built on top of it
use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::search::SearchProvider;
use crate::{Error, Result};

const USER_AGENT: &str = concat!("repoquest/", env!("CARGO_PKG_VERSION"));

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl RetryConfig {
    /// Reject settings that would break the backoff schedule
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::ConfigError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 2.0 {
            return Err(Error::ConfigError(format!(
                "retry.backoff_multiplier must be a finite number >= 2.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Check if an HTTP status code is worth retrying
///
/// Auth and not-found failures never improve. Everything else that isn't a
/// success (rate limits, server errors, odd 4xx) gets another go.
pub fn is_retryable_status(status: StatusCode) -> bool {
    !status.is_success()
        && status != StatusCode::UNAUTHORIZED
        && status != StatusCode::FORBIDDEN
        && status != StatusCode::NOT_FOUND
}

/// Run a future unless the token fires first
pub async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        out = fut => Ok(out),
    }
}

/// Execute an operation with retry logic
///
/// Non-retryable errors come back untouched on the first failure. Retryable
/// ones are attempted up to `max_attempts` times, sleeping between attempts
/// with a delay that grows by `backoff_multiplier` each time. Sleeps end
/// early with [`Error::Cancelled`] when the token fires.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = Duration::from_millis(config.initial_delay_ms);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("Request succeeded on attempt {}", attempt);
                }
                return Ok(result);
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if attempt >= max_attempts {
                    warn!("Request failed after {} attempts: {}", attempt, err);
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }

                warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    attempt, max_attempts, err, delay
                );

                cancellable(cancel, sleep(delay)).await?;
                delay = next_delay(delay, config.backoff_multiplier);
            }
        }
    }
}

/// Grow `delay` by `multiplier`, never by less than double. Saturates
/// instead of overflowing.
fn next_delay(delay: Duration, multiplier: f64) -> Duration {
    let doubled = delay.saturating_mul(2);
    if !multiplier.is_finite() || multiplier <= 2.0 {
        return doubled;
    }
    Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier).unwrap_or(Duration::MAX)
}

/// Turns a URL into a successful response, hiding transient failures
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// HTTP client with the defaults every provider shares
    pub fn default_client() -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Fetch `url`, retrying transient failures.
    ///
    /// The request is rebuilt through the provider on every attempt. The
    /// returned response always has a 2xx status and its body unread.
    pub async fn fetch(
        &self,
        provider: &dyn SearchProvider,
        cancel: &CancellationToken,
        url: &Url,
    ) -> Result<Response> {
        with_retry(&self.retry, cancel, || self.attempt(provider, cancel, url)).await
    }

    async fn attempt(
        &self,
        provider: &dyn SearchProvider,
        cancel: &CancellationToken,
        url: &Url,
    ) -> Result<Response> {
        let request = provider.build_search_request(&self.client, url)?;
        let response = cancellable(cancel, self.client.execute(request)).await??;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Drain so the connection goes back to the pool before we retry
        let body = match cancellable(cancel, response.text()).await? {
            Ok(body) => body,
            Err(e) => format!("<body unavailable: {}>", e),
        };
        Err(Error::HttpStatus { status, body })
    }
}
