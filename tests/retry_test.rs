use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use huginn::retry::{self, RetryConfig};
use huginn::{CancellationToken, HuginnError, Result};

/// Mock upstream call that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: HuginnError,
    total_calls: AtomicU32,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: HuginnError) -> Arc<Self> {
        Arc::new(Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            total_calls: AtomicU32::new(0),
        })
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }

    async fn call(&self) -> Result<&'static str> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_count.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::SeqCst);
            return Err(self.fail_with.clone());
        }
        Ok("ok")
    }
}

fn fast() -> RetryConfig {
    RetryConfig::new()
        .max_attempts(3)
        .base_delay(Duration::from_millis(1))
        .jitter_factor(0.0)
}

fn status(code: u16) -> HuginnError {
    HuginnError::Api {
        status: code,
        message: "upstream".into(),
    }
}

#[tokio::test]
async fn retries_503_then_succeeds() {
    let upstream = FailThenSucceed::new(2, status(503));
    let result = retry::execute(&fast(), None, "k", || upstream.call()).await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(upstream.call_count(), 3); // 2 failures + 1 success
}

#[tokio::test]
async fn every_retryable_status_is_retried() {
    for code in [408, 429, 500, 502, 503, 504] {
        let upstream = FailThenSucceed::new(1, status(code));
        let result = retry::execute(&fast(), None, "k", || upstream.call()).await;
        assert!(result.is_ok(), "status {code} was not retried");
        assert_eq!(upstream.call_count(), 2);
    }
}

#[tokio::test]
async fn connection_errors_are_retried() {
    let upstream = FailThenSucceed::new(1, HuginnError::Http("connection reset".into()));
    let result = retry::execute(&fast(), None, "k", || upstream.call()).await;
    assert!(result.is_ok());
    assert_eq!(upstream.call_count(), 2);
}

#[tokio::test]
async fn does_not_retry_404() {
    let upstream = FailThenSucceed::new(1, status(404));
    let result = retry::execute(&fast(), None, "k", || upstream.call()).await;

    assert!(matches!(result, Err(HuginnError::Api { status: 404, .. })));
    assert_eq!(upstream.call_count(), 1); // no retry
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let upstream = FailThenSucceed::new(10, status(502));
    let result = retry::execute(&fast(), None, "k", || upstream.call()).await;

    match result {
        Err(HuginnError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last.status(), Some(502));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(upstream.call_count(), 3);
}

#[tokio::test]
async fn disabled_config_no_retry() {
    let upstream = FailThenSucceed::new(1, status(503));
    let result = retry::execute(&RetryConfig::disabled(), None, "k", || upstream.call()).await;

    assert!(matches!(result, Err(HuginnError::RetriesExhausted { attempts: 1, .. })));
    assert_eq!(upstream.call_count(), 1);
}

#[tokio::test]
async fn cancelled_token_prevents_any_attempt() {
    let upstream = FailThenSucceed::new(0, status(503));
    let token = CancellationToken::new();
    token.cancel();

    let result = retry::execute(&fast(), Some(&token), "k", || upstream.call()).await;

    assert!(matches!(result, Err(HuginnError::Cancelled)));
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_cuts_backoff_short() {
    let upstream = FailThenSucceed::new(5, status(503));
    let config = RetryConfig::new()
        .max_attempts(5)
        .base_delay(Duration::from_secs(60))
        .max_delay(Duration::from_secs(60))
        .jitter_factor(0.0)
        .time_budget(Duration::from_secs(600));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let start = tokio::time::Instant::now();
    let result = retry::execute(&config, Some(&token), "k", || upstream.call()).await;

    assert!(matches!(result, Err(HuginnError::Cancelled)));
    assert_eq!(upstream.call_count(), 1);
    assert!(start.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn time_budget_stops_further_attempts() {
    let upstream = FailThenSucceed::new(10, status(500));
    let config = RetryConfig::new()
        .max_attempts(10)
        .base_delay(Duration::from_secs(4))
        .max_delay(Duration::from_secs(4))
        .jitter_factor(0.0)
        .time_budget(Duration::from_secs(10));

    let result = retry::execute(&config, None, "k", || upstream.call()).await;

    match result {
        Err(HuginnError::BudgetExceeded { budget, last }) => {
            assert_eq!(budget, Duration::from_secs(10));
            assert_eq!(last.and_then(|e| e.status()), Some(500));
        }
        other => panic!("expected BudgetExceeded, got {other:?}"),
    }
    // Attempts start at t=0, 4, 8; the check before t=12 fails.
    assert_eq!(upstream.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn respects_retry_after_hint() {
    let upstream = FailThenSucceed::new(1, HuginnError::RateLimited {
        retry_after: Some(Duration::from_secs(7)),
    });
    let config = fast().time_budget(Duration::from_secs(60));

    let start = tokio::time::Instant::now();
    let result = retry::execute(&config, None, "k", || upstream.call()).await;

    assert!(result.is_ok());
    // Waited the hint, not the 1ms base delay.
    assert!(start.elapsed() >= Duration::from_secs(7));
}

#[test]
fn retry_after_hint_is_capped() {
    let config = RetryConfig::new().max_delay(Duration::from_secs(2));
    assert_eq!(
        config.effective_delay(1, Some(Duration::from_secs(90))),
        Duration::from_secs(2)
    );
}

#[test]
fn retry_config_defaults() {
    let config = RetryConfig::default();
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.time_budget, Duration::from_secs(30));
    assert_eq!(config.delay_for_attempt(1), config.base_delay);
    assert_eq!(config.delay_for_attempt(2), config.base_delay * 2);
}

#[test]
fn delay_never_exceeds_max() {
    let config = RetryConfig::new()
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(1))
        .jitter_factor(1.0);
    for attempt in 1..30 {
        assert!(config.effective_delay(attempt, None) <= Duration::from_secs(1));
    }
}
