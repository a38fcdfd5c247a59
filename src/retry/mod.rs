//! Retry configuration and the retry executor.
//!
//! [`execute`] wraps a single upstream call with bounded retries:
//!
//! - up to [`RetryConfig::max_attempts`] attempts,
//! - a wall-clock [`RetryConfig::time_budget`] measured from the first attempt,
//! - a cancellation checkpoint before every attempt and during every
//!   backoff sleep.
//!
//! Failures are classified by [`HuginnError::is_transient()`]. Terminal
//! errors are returned as-is after one attempt; transient errors that
//! survive every attempt come back wrapped in
//! [`HuginnError::RetriesExhausted`].

pub mod backoff;

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::telemetry;
use crate::{HuginnError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff with proportional jitter:
///
/// ```rust
/// # use huginn::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .base_delay(Duration::from_millis(200))
///     .jitter_factor(0.1);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Delay after the first failed attempt. Default: 500ms.
    pub base_delay: Duration,
    /// Maximum delay between attempts (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
    /// Fraction of the delay randomly added or removed, `0.0..=1.0`. Default: 0.25.
    pub jitter_factor: f64,
    /// Wall-clock budget from the first attempt. Default: 30s.
    pub time_budget: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.25,
            time_budget: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the delay after the first failed attempt.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay between attempts.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter factor (`0.0` disables jitter).
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Set the wall-clock budget for all attempts of one call.
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    /// Delay after `attempt` (1-based) failed, without jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        backoff::exponential(attempt, self.base_delay, self.max_delay)
    }

    /// Delay to sleep after `attempt` failed, jitter included.
    ///
    /// A `retry_after` hint from a rate-limited response takes precedence
    /// over the computed backoff, capped at `max_delay`.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => backoff::delay(
                attempt,
                self.base_delay,
                self.max_delay,
                self.jitter_factor,
            ),
        }
    }
}

/// Execute an async operation with retry logic.
///
/// Retries on transient errors up to `config.max_attempts`, sleeping
/// between attempts according to [`RetryConfig::effective_delay`].
/// Before every attempt the time budget and `token` are checked; a
/// cancelled token also cuts a backoff sleep short.
///
/// `key` only labels log records.
pub async fn execute<F, Fut, T>(
    config: &RetryConfig,
    token: Option<&CancellationToken>,
    key: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let started = Instant::now();
    let mut last_err: Option<HuginnError> = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 && started.elapsed() >= config.time_budget {
            debug!(
                key,
                attempt,
                budget_ms = config.time_budget.as_millis() as u64,
                "time budget exceeded"
            );
            return Err(HuginnError::BudgetExceeded {
                budget: config.time_budget,
                last: last_err.map(Box::new),
            });
        }
        if token.is_some_and(CancellationToken::is_cancelled) {
            return Err(cancelled(key, attempt));
        }

        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                if attempt < max_attempts {
                    let delay = config.effective_delay(attempt, e.retry_after());
                    metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
                    warn!(
                        key,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    sleep_or_cancel(delay, token).await.map_err(|e| {
                        debug!(key, attempt, "cancelled during backoff");
                        e
                    })?;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e), // terminal, no retry
        }
    }

    match last_err {
        Some(last) => Err(HuginnError::RetriesExhausted {
            attempts: max_attempts,
            last: Box::new(last),
        }),
        // Every loop iteration either returns or records an error.
        None => Err(HuginnError::Configuration("max_attempts must be >= 1".into())),
    }
}

/// Sleep for `delay`, returning early with [`HuginnError::Cancelled`] if the
/// token fires first.
async fn sleep_or_cancel(delay: Duration, token: Option<&CancellationToken>) -> Result<()> {
    match token {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => {
                    metrics::counter!(telemetry::CANCELLATIONS_TOTAL).increment(1);
                    Err(HuginnError::Cancelled)
                }
                _ = tokio::time::sleep(delay) => Ok(()),
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

fn cancelled(key: &str, attempt: u32) -> HuginnError {
    debug!(key, attempt, "cancelled before attempt");
    metrics::counter!(telemetry::CANCELLATIONS_TOTAL).increment(1);
    HuginnError::Cancelled
}
