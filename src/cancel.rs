//! Context-scoped cancellation.
//!
//! Navigation glue calls [`CancellationRegistry::new_token`] when it enters a
//! view. Any token still live for the same context key is cancelled first,
//! so work issued for the previous view stops at its next checkpoint
//! (before an attempt, during a backoff sleep, or while queued for a slot).
//! At most one live token exists per context key.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Map from context key to the token currently live for it.
#[derive(Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the live token for `context` (if any) and install a fresh one.
    pub fn new_token(&self, context: &str) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self.lock().insert(context.to_owned(), token.clone());
        if let Some(previous) = previous {
            debug!(context, "superseding cancellation token");
            previous.cancel();
        }
        token
    }

    /// The live token for `context`, creating one if none is registered.
    ///
    /// Unlike [`new_token`](Self::new_token) this never cancels anything.
    pub fn token(&self, context: &str) -> CancellationToken {
        self.lock()
            .entry(context.to_owned())
            .or_insert_with(CancellationToken::new)
            .clone()
    }

    /// Cancel and forget the token for `context`. Returns whether one existed.
    pub fn cancel(&self, context: &str) -> bool {
        match self.lock().remove(context) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every live token and clear the registry.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        debug!(count = drained.len(), "cancelling all contexts");
        for (_, token) in drained {
            token.cancel();
        }
    }

    /// Number of contexts with a live token.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
        // Critical sections are plain map operations; a poisoned lock still
        // holds a consistent map.
        self.tokens
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_supersedes_previous() {
        let registry = CancellationRegistry::new();
        let first = registry.new_token("page");
        let second = registry.new_token("page");
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn contexts_are_independent() {
        let registry = CancellationRegistry::new();
        let a = registry.new_token("a");
        let _b = registry.new_token("b");
        registry.new_token("b");
        assert!(!a.is_cancelled());
    }

    #[test]
    fn token_reuses_live_token() {
        let registry = CancellationRegistry::new();
        let registered = registry.new_token("page");
        let resolved = registry.token("page");
        registered.cancel();
        assert!(resolved.is_cancelled());
    }

    #[test]
    fn token_creates_when_missing() {
        let registry = CancellationRegistry::new();
        let token = registry.token("fresh");
        assert!(!token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cancel_single_context() {
        let registry = CancellationRegistry::new();
        let a = registry.new_token("a");
        let b = registry.new_token("b");
        assert!(registry.cancel("a"));
        assert!(!registry.cancel("a"));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
    }

    #[test]
    fn cancel_all_clears() {
        let registry = CancellationRegistry::new();
        let a = registry.new_token("a");
        let b = registry.new_token("b");
        registry.cancel_all();
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(registry.is_empty());
    }
}
