//! Huginn - request orchestration for page-enrichment frontends
//!
//! A frontend that decorates media-server pages with recommendations,
//! discovery feeds, and overlays fires many small, overlapping upstream
//! requests on every navigation. This crate schedules them:
//!
//! - identical concurrent requests share one underlying call ([`dedup`]),
//! - transient failures are retried with capped, jittered backoff ([`retry`]),
//! - at most N calls run at once, with a bounded FIFO queue ([`limiter`]),
//! - successful responses are cached with TTL expiry and LRU eviction ([`cache`]),
//! - navigating away cancels the previous view's work ([`cancel`]).
//!
//! [`Engine`] composes them behind a single `fetch` call.
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{Engine, HuginnError};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let engine: Engine<String> = Engine::builder().build()?;
//!
//!     // Entering the genre view supersedes whatever the last view started.
//!     engine.new_cancellation_token("view");
//!
//!     let page = engine
//!         .fetch("genre:42:page:1", Some("view"), || async {
//!             Ok::<_, HuginnError>("[...]".to_string())
//!         })
//!         .await;
//!
//!     match page {
//!         Ok(body) => println!("{body}"),
//!         Err(e) if e.is_cancelled() => {} // abandoned, not a failure
//!         Err(e) => eprintln!("could not load genre: {e}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod limiter;
pub mod retry;
pub mod telemetry;

// Re-export main types at crate root
pub use cache::{CacheConfig, ResponseCache};
pub use cancel::CancellationRegistry;
pub use config::EngineConfig;
pub use dedup::Deduplicator;
pub use engine::{Engine, EngineBuilder, EngineStats};
pub use error::{HuginnError, Result};
pub use limiter::{ConcurrencyLimiter, LimiterConfig};
pub use retry::RetryConfig;
pub use tokio_util::sync::CancellationToken;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
