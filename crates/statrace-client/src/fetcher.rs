//! Resilient HTTP fetcher with rotating client identities.
//!
//! One logical fetch = up to `attempts` HTTP attempts. Each attempt wears a
//! random header profile from the pool (profiles are not sticky across
//! attempts). Rate-limit and server-side failures back off exponentially
//! with jitter; client-side rejections and missing resources bail
//! immediately without touching the remaining retry budget.
//!
//! Pacing is deliberately not handled here; compose a fetch with the
//! scheduler (`PacedFetcher` or manual acquire/release) instead.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use statrace_core::error::Error;
use statrace_core::traits::Fetcher;

use crate::headers::{HeaderProfile, default_profiles};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Exponential backoff with optional jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub factor: u32,
    /// Multiply each delay by a random factor in [1, 2) to avoid
    /// resonating with other clients backing off from the same outage.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
            factor: 2,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-indexed), capped at
    /// `max_delay` after jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.factor).saturating_pow(attempt.saturating_sub(1));
        let base_ms = (self.min_delay.as_millis() as u64).saturating_mul(factor);
        let ms = if self.jitter {
            let scaled = (base_ms as f64) * (1.0 + unit_rand());
            scaled as u64
        } else {
            base_ms
        };
        Duration::from_millis(ms).min(self.max_delay)
    }
}

/// HTTP fetcher with retries and rotating identity headers.
#[derive(Clone)]
pub struct StealthFetcher {
    client: Client,
    profiles: Arc<Vec<HeaderProfile>>,
    retry: RetryPolicy,
    timeout_secs: u64,
    /// Maps the pool size to a profile index; injectable for tests.
    pick: Arc<dyn Fn(usize) -> usize + Send + Sync>,
}

impl StealthFetcher {
    pub fn new() -> Result<Self, Error> {
        Self::with_profiles(default_profiles())
    }

    pub fn with_profiles(profiles: Vec<HeaderProfile>) -> Result<Self, Error> {
        if profiles.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one header profile is required".into(),
            ));
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            profiles: Arc::new(profiles),
            retry: RetryPolicy::default(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            pick: Arc::new(|len| (xorshift_entropy() as usize) % len),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the random profile picker, e.g. with a fixed index in tests.
    #[must_use]
    pub fn with_picker(mut self, pick: impl Fn(usize) -> usize + Send + Sync + 'static) -> Self {
        self.pick = Arc::new(pick);
        self
    }

    async fn attempt(&self, url: &str, profile: &HeaderProfile) -> Result<String, Error> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, profile.user_agent.as_str())
            .header(ACCEPT, profile.accept.as_str())
            .header(ACCEPT_LANGUAGE, profile.accept_language.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    Error::Network(format!("connection failed: {e}"))
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .text()
                .await
                .map_err(|e| Error::Network(format!("failed to read response body: {e}")));
        }

        let status = status.as_u16();
        match status {
            404 => Err(Error::NotFound { url: url.into() }),
            429 | 500..=599 => Err(Error::TransientHttp {
                status,
                url: url.into(),
            }),
            400..=499 => Err(Error::PermanentHttp {
                status,
                url: url.into(),
            }),
            // Anything else surfacing here is unexpected; give it a retry.
            _ => Err(Error::TransientHttp {
                status,
                url: url.into(),
            }),
        }
    }
}

impl Fetcher for StealthFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.retry.attempts {
            let profile = &self.profiles[(self.pick)(self.profiles.len()) % self.profiles.len()];
            tracing::debug!(%url, attempt, user_agent = %profile.user_agent, "Fetching");

            match self.attempt(url, profile).await {
                Ok(body) => {
                    tracing::debug!(%url, attempt, bytes = body.len(), "Fetched");
                    return Ok(body);
                }
                Err(e) if e.is_permanent_fetch() => {
                    tracing::warn!(%url, error = %e, "Permanent failure, not retrying");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(%url, attempt, error = %e, "Attempt failed");
                    last_error = Some(e);
                    if attempt < self.retry.attempts {
                        let delay = self.retry.delay_for_attempt(attempt);
                        tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(Error::RetriesExhausted {
            url: url.into(),
            attempts: self.retry.attempts,
            last: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Deterministic-enough randomness based on std, avoiding the `rand`
// crate. Uses a simple xorshift seeded from the current time.
// ---------------------------------------------------------------------------

fn xorshift_entropy() -> u64 {
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

/// Uniform-ish value in [0, 1).
fn unit_rand() -> f64 {
    (xorshift_entropy() % 1_000_000) as f64 / 1_000_000.0
}
