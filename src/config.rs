//! Engine configuration.
//!
//! [`EngineConfig`] aggregates the per-component configs. It is usually
//! built in code, but can also be loaded from TOML with the following
//! resolution order:
//! 1. explicit path (e.g. a `--config` flag)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! Every key is optional and falls back to its default:
//!
//! ```toml
//! max_concurrent = 4
//! max_queue_size = 50
//! max_attempts = 3
//! base_delay_ms = 500
//! max_delay_ms = 30000
//! jitter_factor = 0.25
//! time_budget_ms = 30000
//! cache_ttl_ms = 300000
//! cache_max_entries = 100
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::limiter::LimiterConfig;
use crate::retry::RetryConfig;
use crate::{HuginnError, Result};

/// Complete configuration of one [`Engine`](crate::Engine).
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub limiter: LimiterConfig,
    pub cache: CacheConfig,
}

/// On-disk representation: flat keys, durations in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    max_concurrent: Option<usize>,
    max_queue_size: Option<usize>,
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    jitter_factor: Option<f64>,
    time_budget_ms: Option<u64>,
    cache_ttl_ms: Option<u64>,
    cache_max_entries: Option<u64>,
}

impl From<FileConfig> for EngineConfig {
    fn from(file: FileConfig) -> Self {
        let retry = RetryConfig::default();
        let limiter = LimiterConfig::default();
        let cache = CacheConfig::default();
        Self {
            retry: RetryConfig {
                max_attempts: file.max_attempts.unwrap_or(retry.max_attempts),
                base_delay: file.base_delay_ms.map_or(retry.base_delay, Duration::from_millis),
                max_delay: file.max_delay_ms.map_or(retry.max_delay, Duration::from_millis),
                jitter_factor: file.jitter_factor.unwrap_or(retry.jitter_factor),
                time_budget: file.time_budget_ms.map_or(retry.time_budget, Duration::from_millis),
            },
            limiter: LimiterConfig {
                max_concurrent: file.max_concurrent.unwrap_or(limiter.max_concurrent),
                max_queue_size: file.max_queue_size.unwrap_or(limiter.max_queue_size),
            },
            cache: CacheConfig {
                max_entries: file.cache_max_entries.unwrap_or(cache.max_entries),
                ttl: file.cache_ttl_ms.map_or(cache.ttl, Duration::from_millis),
            },
        }
    }
}

impl EngineConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the limiter configuration.
    pub fn limiter(mut self, limiter: LimiterConfig) -> Self {
        self.limiter = limiter;
        self
    }

    /// Replace the cache configuration.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| HuginnError::Configuration(format!("Failed to parse config: {e}")))?;
        let config = Self::from(file);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Load from the standard locations, or fall back to defaults when no
    /// file exists and no explicit path was given.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match explicit_path {
            Some(_) => Self::load(explicit_path),
            None => match Self::resolve_config_path(None) {
                Ok(path) => Self::load(Some(&path)),
                Err(_) => Ok(Self::default()),
            },
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(HuginnError::Configuration(msg.to_string()));
        if self.limiter.max_concurrent == 0 {
            return invalid("max_concurrent must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return invalid("max_attempts must be at least 1");
        }
        if self.cache.max_entries == 0 {
            return invalid("cache_max_entries must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return invalid("jitter_factor must be within 0.0..=1.0");
        }
        if self.retry.base_delay > self.retry.max_delay {
            return invalid("base_delay must not exceed max_delay");
        }
        Ok(())
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HuginnError::Configuration(
            "No config file found. Create ~/.huginn/config.toml or /etc/huginn/config.toml"
                .to_string(),
        ))
    }
}
