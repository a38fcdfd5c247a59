//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `status`: outcome of a fetch: "ok", "cache_hit", or an error kind
//!   ("cancelled", "queue_full", "api", ...)

/// Total `fetch` calls handled by an engine.
///
/// Labels: `status`.
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Wall-clock duration of `fetch` calls in seconds, cache hits included.
pub const REQUEST_DURATION_SECONDS: &str = "huginn_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
pub const RETRIES_TOTAL: &str = "huginn_retries_total";

/// Total response cache hits.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total response cache misses (expired entries included).
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Callers that joined an already in-flight request instead of issuing one.
pub const DEDUP_JOINS_TOTAL: &str = "huginn_dedup_joins_total";

/// Callers rejected because the limiter's wait queue was full.
pub const QUEUE_REJECTIONS_TOTAL: &str = "huginn_queue_rejections_total";

/// Requests abandoned at a cancellation checkpoint.
pub const CANCELLATIONS_TOTAL: &str = "huginn_cancellations_total";
