//! Builder for configuring engine instances

use std::marker::PhantomData;

use super::Engine;
use crate::Result;
use crate::cache::CacheConfig;
use crate::config::EngineConfig;
use crate::limiter::LimiterConfig;
use crate::retry::RetryConfig;

/// Builder for configuring engine instances.
///
/// ```rust
/// # use huginn::{Engine, LimiterConfig, RetryConfig};
/// let engine: Engine<String> = Engine::builder()
///     .retry(RetryConfig::new().max_attempts(5))
///     .limiter(LimiterConfig::new().max_concurrent(2))
///     .build()
///     .unwrap();
/// ```
pub struct EngineBuilder<V> {
    config: EngineConfig,
    _value: PhantomData<fn() -> V>,
}

impl<V> Default for EngineBuilder<V> {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            _value: PhantomData,
        }
    }
}

impl<V> EngineBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a complete configuration (e.g. one loaded from TOML).
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the concurrency limiter configuration.
    pub fn limiter(mut self, limiter: LimiterConfig) -> Self {
        self.config.limiter = limiter;
        self
    }

    /// Set the response cache configuration.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<Engine<V>> {
        self.config.validate()?;
        Ok(Engine::from_config(self.config))
    }
}
