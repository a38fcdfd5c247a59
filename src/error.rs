//! Huginn error types

use std::time::Duration;

/// HTTP-style status codes that are worth another attempt.
pub const RETRYABLE_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Huginn error types
///
/// `Clone` so that one shared outcome can be handed to every caller that
/// joined the same in-flight request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HuginnError {
    // Upstream/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    // Data errors
    #[error("JSON error: {0}")]
    Json(String),

    // Orchestration outcomes
    #[error("request cancelled")]
    Cancelled,

    #[error("request queue full ({capacity} waiters)")]
    QueueFull { capacity: usize },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<HuginnError>,
    },

    #[error("time budget of {budget:?} exceeded")]
    BudgetExceeded {
        budget: Duration,
        last: Option<Box<HuginnError>>,
    },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HuginnError {
    /// Whether another attempt might succeed.
    ///
    /// Connection-level failures, rate limiting, and the statuses in
    /// [`RETRYABLE_STATUSES`] are transient. Everything else, including
    /// cancellation and the orchestration outcomes, is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            HuginnError::Http(_) | HuginnError::RateLimited { .. } => true,
            HuginnError::Api { status, .. } => RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }

    /// Whether this error means the caller's context was abandoned.
    ///
    /// Callers usually suppress these instead of reporting them.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HuginnError::Cancelled)
    }

    /// Server-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HuginnError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Upstream status code, looking through retry/budget wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            HuginnError::Api { status, .. } => Some(*status),
            HuginnError::RateLimited { .. } => Some(429),
            HuginnError::RetriesExhausted { last, .. } => last.status(),
            HuginnError::BudgetExceeded { last, .. } => last.as_ref().and_then(|e| e.status()),
            _ => None,
        }
    }

    /// Short label used for metrics and log fields.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            HuginnError::Http(_) => "http",
            HuginnError::Api { .. } => "api",
            HuginnError::RateLimited { .. } => "rate_limited",
            HuginnError::Json(_) => "json",
            HuginnError::Cancelled => "cancelled",
            HuginnError::QueueFull { .. } => "queue_full",
            HuginnError::RetriesExhausted { .. } => "retries_exhausted",
            HuginnError::BudgetExceeded { .. } => "budget_exceeded",
            HuginnError::Configuration(_) => "configuration",
        }
    }
}

impl From<serde_json::Error> for HuginnError {
    fn from(err: serde_json::Error) -> Self {
        HuginnError::Json(err.to_string())
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
