//! Sliding-window request budgeting with even spacing.
//!
//! Upstream tolerates a fixed number of requests per trailing window. The
//! window alone would still allow a burst of the full budget right at the
//! window boundary, so a second layer enforces a minimum gap between
//! request starts, spreading the budget evenly across the window.
//!
//! The ledger tracks *completion* times, not start times: a slow response
//! pays for its budget when it finishes, so throughput self-throttles when
//! the upstream slows down instead of piling up a backlog.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use statrace_core::limiter::{LimiterConfig, RateLimiter};
//!
//! # async fn run() -> Result<(), statrace_core::Error> {
//! let limiter = Arc::new(RateLimiter::new(LimiterConfig::default()));
//! let slot = limiter.acquire().await;
//! // ... perform one request ...
//! limiter.release(slot).await;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::traits::Fetcher;

/// Configuration for the request scheduler.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Maximum completed requests inside one trailing window.
    pub max_requests: usize,

    /// Length of the trailing window.
    pub window: Duration,

    /// Safety margin added when waiting for the oldest completion to age
    /// out of the window.
    pub buffer: Duration,
}

impl LimiterConfig {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            buffer: Duration::from_millis(100),
        }
    }

    #[must_use]
    pub fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    /// Minimum gap between request starts: `ceil(window / max_requests)`.
    pub fn min_interval(&self) -> Duration {
        let window_ms = self.window.as_millis() as u64;
        let max = self.max_requests as u64;
        Duration::from_millis(window_ms.div_ceil(max))
    }
}

impl Default for LimiterConfig {
    /// 10 requests per 60 seconds, polite enough for stats sites that
    /// ban aggressive crawlers.
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

/// Permission to issue one request, returned by [`RateLimiter::acquire`].
///
/// Hand it back via [`RateLimiter::release`] once the request finishes,
/// successfully or not: the budget opportunity was consumed either way.
#[must_use = "a slot that is never released does not count against the window"]
#[derive(Debug)]
pub struct ScheduleSlot {
    issued_at: Instant,
}

impl ScheduleSlot {
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

#[derive(Debug, Default)]
struct Ledger {
    /// Completion timestamps inside the current window, oldest first.
    completions: VecDeque<Instant>,
    last_issue: Option<Instant>,
}

impl Ledger {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.completions.front() {
            if now.duration_since(oldest) >= window {
                self.completions.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Enforces the two-layer pacing policy. The ledger is owned exclusively
/// by this type; concurrent fetch streams may share one instance behind an
/// `Arc` and the mutex serialises the read-prune-append sequence.
pub struct RateLimiter {
    config: LimiterConfig,
    state: Mutex<Ledger>,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            state: Mutex::new(Ledger::default()),
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Wait for a request slot. Suspends until both the window budget and
    /// the minimum inter-issue spacing allow another request.
    pub async fn acquire(&self) -> ScheduleSlot {
        // A fresh token is never cancelled, so this cannot fail.
        match self.acquire_with_cancel(&CancellationToken::new()).await {
            Ok(slot) => slot,
            Err(_) => unreachable!("acquire without an external token cannot be cancelled"),
        }
    }

    /// Like [`acquire`](Self::acquire), but every suspension races the
    /// token and resolves to [`Error::Cancelled`] when it fires.
    pub async fn acquire_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ScheduleSlot, Error> {
        // Layer 1: the trailing-window budget.
        loop {
            let wait = {
                let mut ledger = self.state.lock().await;
                let now = Instant::now();
                ledger.prune(now, self.config.window);

                if ledger.completions.len() >= self.config.max_requests {
                    // Entries survived pruning, so the front exists and is
                    // younger than the window.
                    ledger.completions.front().map(|&oldest| {
                        self.config.window - now.duration_since(oldest) + self.config.buffer
                    })
                } else {
                    None
                }
            };

            let Some(wait) = wait else { break };
            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                "Request budget exhausted, waiting for window"
            );
            // Lock is already dropped; other streams stay unblocked.
            sleep_or_cancel(wait, cancel).await?;
            // Loop back to re-prune before claiming the slot.
        }

        // Layer 2: minimum spacing between request starts.
        loop {
            let wait = {
                let ledger = self.state.lock().await;
                match ledger.last_issue {
                    Some(last) => {
                        let elapsed = Instant::now().duration_since(last);
                        let min_interval = self.config.min_interval();
                        (elapsed < min_interval).then(|| min_interval - elapsed)
                    }
                    None => None,
                }
            };

            let Some(wait) = wait else { break };
            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                "Maintaining minimum interval between requests"
            );
            sleep_or_cancel(wait, cancel).await?;
        }

        let mut ledger = self.state.lock().await;
        let now = Instant::now();
        ledger.last_issue = Some(now);
        Ok(ScheduleSlot { issued_at: now })
    }

    /// Record the completion of the request the slot was issued for. Call
    /// this on failure too: a failed request consumed the opportunity.
    pub async fn release(&self, slot: ScheduleSlot) {
        let now = Instant::now();
        let mut ledger = self.state.lock().await;
        ledger.completions.push_back(now);
        tracing::debug!(
            in_flight_ms = now.duration_since(slot.issued_at).as_millis() as u64,
            tracked = ledger.completions.len(),
            "Request completed"
        );
    }

    /// Run one request under the budget: acquire, execute, then release,
    /// whether the request succeeded or failed.
    pub async fn run<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let slot = self.acquire().await;
        let result = f().await;
        self.release(slot).await;
        result
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<(), Error> {
    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        () = cancel.cancelled() => Err(Error::Cancelled),
    }
}

/// A [`Fetcher`] wrapper that routes every fetch through a shared
/// [`RateLimiter`], releasing the slot on success and failure alike.
#[derive(Clone)]
pub struct PacedFetcher<F> {
    inner: F,
    limiter: Arc<RateLimiter>,
}

impl<F: Fetcher> PacedFetcher<F> {
    pub fn new(inner: F, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

impl<F: Fetcher> Fetcher for PacedFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        self.limiter.run(|| self.inner.fetch(url)).await
    }
}
