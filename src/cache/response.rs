//! Response cache with per-entry TTL and least-recently-used eviction.
//!
//! Backed by moka's synchronous cache configured with
//! [`EvictionPolicy::lru()`]: every read and write refreshes an entry's
//! recency, and once [`CacheConfig::max_entries`] is exceeded the least
//! recently used entry is evicted. Expiry is lazy: moka refuses to return
//! an entry whose age has reached the TTL, whether or not housekeeping has
//! removed it yet.
//!
//! moka applies recency and capacity bookkeeping in batches. The cache
//! runs that bookkeeping after every write so the capacity bound holds as
//! soon as `set` returns.

use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::trace;

use crate::telemetry;

/// Configuration for the response cache.
///
/// ```rust
/// # use huginn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(500)
///     .ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 100.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: 5 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Bounded TTL + LRU cache keyed on request keys.
pub struct ResponseCache<V> {
    cache: Cache<String, V>,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { cache }
    }

    /// Look up a cached value, refreshing its recency on a hit.
    ///
    /// Returns `None` on a miss or when the entry has outlived the TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.cache.get(key) {
            Some(value) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                trace!(key, "cache hit");
                Some(value)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                trace!(key, "cache miss");
                None
            }
        }
    }

    /// Insert or overwrite a value. Overwriting restarts the entry's TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.cache.insert(key.into(), value);
        self.cache.run_pending_tasks();
    }

    /// Whether `key` holds a live entry. Does not touch recency or metrics.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Remove `key_or_prefix` and every key that starts with it.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, key_or_prefix: &str) -> usize {
        let matching: Vec<_> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(key_or_prefix))
            .map(|(key, _)| key)
            .collect();
        for key in &matching {
            self.cache.invalidate(key.as_str());
        }
        self.cache.run_pending_tasks();
        matching.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }
}
