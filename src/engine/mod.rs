//! The orchestration facade.
//!
//! [`Engine::fetch`] is the only call collaborators need:
//!
//! ```text
//! fetch(key, context, producer)
//!         │
//!         ▼
//!   ResponseCache ── hit ──► value
//!         │ miss
//!         ▼
//!   Deduplicator ── joined ──► shared outcome
//!   (bypassed when a cancellation token is in play)
//!         │
//!         ▼
//!   ConcurrencyLimiter ── queue full / cancelled while queued
//!         │ slot
//!         ▼
//!   retry::execute ── backoff between transient failures
//!         │
//!         ▼
//!     producer()
//! ```
//!
//! A successful value is written to the cache once, inside the underlying
//! call, before its in-flight entry is removed. Failures are never cached.
//!
//! One engine owns all of its state (cache, in-flight table, slots,
//! cancellation tokens); independent engines share nothing. `Engine` is a
//! cheap handle and can be cloned into tasks.

mod builder;

pub use builder::EngineBuilder;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::cache::ResponseCache;
use crate::cancel::CancellationRegistry;
use crate::config::EngineConfig;
use crate::dedup::Deduplicator;
use crate::limiter::ConcurrencyLimiter;
use crate::retry::{self, RetryConfig};
use crate::telemetry;
use crate::{HuginnError, Result};

/// Request orchestration engine for values of type `V`.
pub struct Engine<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for Engine<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<V> {
    config: EngineConfig,
    cache: ResponseCache<V>,
    dedup: Deduplicator<V>,
    limiter: ConcurrencyLimiter,
    cancellations: CancellationRegistry,
    stats: StatsCounters,
}

/// Aggregate counters for one engine since it was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// `fetch` calls, whatever their outcome.
    pub requests: u64,
    /// `fetch` calls answered from the response cache.
    pub cache_hits: u64,
    /// Summed wall-clock time of all `fetch` calls.
    pub total_latency: Duration,
}

#[derive(Default)]
struct StatsCounters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    latency_nanos: AtomicU64,
}

impl<V> Engine<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new builder for configuring the engine.
    pub fn builder() -> EngineBuilder<V> {
        EngineBuilder::new()
    }

    /// Build an engine from a configuration, validating it first.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    pub(crate) fn from_config(config: EngineConfig) -> Self {
        let inner = Inner {
            cache: ResponseCache::new(&config.cache),
            dedup: Deduplicator::new(),
            limiter: ConcurrencyLimiter::new(&config.limiter),
            cancellations: CancellationRegistry::new(),
            stats: StatsCounters::default(),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Get the value for `key` from the cache, or produce it.
    ///
    /// With `context = None`, concurrent callers for the same key share one
    /// underlying call. With a context, the call runs under that context's
    /// live cancellation token (created if the context has none yet) and
    /// bypasses deduplication, so one caller's cancellation never ends
    /// another caller's work.
    ///
    /// `producer` may be invoked several times when attempts fail with
    /// transient errors.
    #[instrument(level = "debug", skip(self, producer))]
    pub async fn fetch<F, Fut>(&self, key: &str, context: Option<&str>, producer: F) -> Result<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let token = context.map(|context| self.inner.cancellations.token(context));
        self.observe(key, token, producer).await
    }

    /// Like [`fetch`](Self::fetch), under an explicit cancellation token.
    #[instrument(level = "debug", skip(self, token, producer))]
    pub async fn fetch_with_token<F, Fut>(
        &self,
        key: &str,
        token: CancellationToken,
        producer: F,
    ) -> Result<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.observe(key, Some(token), producer).await
    }

    /// Cancel the live token for `context` and return its replacement.
    ///
    /// Call when entering a new view, before issuing that view's fetches.
    pub fn new_cancellation_token(&self, context: &str) -> CancellationToken {
        self.inner.cancellations.new_token(context)
    }

    /// Cancel the live token for one context.
    pub fn cancel(&self, context: &str) -> bool {
        self.inner.cancellations.cancel(context)
    }

    /// Cancel every context. Used on full teardown.
    pub fn cancel_all(&self) {
        self.inner.cancellations.cancel_all();
    }

    /// Drop cached values whose key equals or starts with `key_or_prefix`.
    ///
    /// Returns the number of entries removed. In-flight calls are not
    /// affected and will still store their result when they finish.
    pub fn invalidate(&self, key_or_prefix: &str) -> usize {
        let removed = self.inner.cache.invalidate(key_or_prefix);
        debug!(key_or_prefix, removed, "invalidated cache entries");
        removed
    }

    /// Counters accumulated since the engine was built.
    pub fn stats(&self) -> EngineStats {
        let stats = &self.inner.stats;
        EngineStats {
            requests: stats.requests.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            total_latency: Duration::from_nanos(stats.latency_nanos.load(Ordering::Relaxed)),
        }
    }

    /// The response cache, for collaborators that want to peek or seed it.
    pub fn cache(&self) -> &ResponseCache<V> {
        &self.inner.cache
    }

    /// Number of keys with a deduplicated call in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.dedup.in_flight()
    }

    /// Number of limiter slots currently held.
    pub fn active(&self) -> usize {
        self.inner.limiter.active()
    }

    /// Number of callers waiting for a limiter slot.
    pub fn queued(&self) -> usize {
        self.inner.limiter.queued()
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Run one fetch and record its outcome in stats and metrics.
    async fn observe<F, Fut>(
        &self,
        key: &str,
        token: Option<CancellationToken>,
        producer: F,
    ) -> Result<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let started = Instant::now();
        let (result, cache_hit) = match self.inner.cache.get(key) {
            Some(value) => (Ok(value), true),
            None => (self.dispatch(key, token, producer).await, false),
        };
        let elapsed = started.elapsed();

        let stats = &self.inner.stats;
        stats.requests.fetch_add(1, Ordering::Relaxed);
        if cache_hit {
            stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        stats
            .latency_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);

        let status = match (&result, cache_hit) {
            (Ok(_), true) => "cache_hit",
            (Ok(_), false) => "ok",
            (Err(e), _) => e.kind(),
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL, "status" => status).increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS).record(elapsed.as_secs_f64());
        result
    }

    async fn dispatch<F, Fut>(
        &self,
        key: &str,
        token: Option<CancellationToken>,
        producer: F,
    ) -> Result<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        match token {
            Some(token) => {
                let value = Arc::clone(&self.inner)
                    .call(key.to_owned(), Some(token.clone()), producer)
                    .await?;
                // Finished past its last checkpoint: the value is cached,
                // but a superseded caller does not get it.
                if token.is_cancelled() {
                    debug!(key, "discarding result of cancelled request");
                    return Err(HuginnError::Cancelled);
                }
                Ok(value)
            }
            None => {
                let inner = Arc::clone(&self.inner);
                let owned_key = key.to_owned();
                self.inner
                    .dedup
                    .share(key, move || inner.call(owned_key, None, producer))
                    .await
            }
        }
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// One underlying call: slot, retries, cache store.
    async fn call<F, Fut>(
        self: Arc<Self>,
        key: String,
        token: Option<CancellationToken>,
        producer: F,
    ) -> Result<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let retry: &RetryConfig = &self.config.retry;
        let value = self
            .limiter
            .run(token.as_ref(), || {
                retry::execute(retry, token.as_ref(), &key, &producer)
            })
            .await?;
        self.cache.set(key, value.clone());
        Ok(value)
    }
}
