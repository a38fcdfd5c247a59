//! Caching subsystem.
//!
//! [`ResponseCache`] holds successful responses keyed on their request key.
//! It is consulted by [`Engine::fetch()`](crate::Engine::fetch) before any
//! network work, and written exactly once per successful underlying call
//! (inside the shared call, so every deduplicated waiter sees the same
//! stored value). See [`response`] for the eviction and expiry rules.

pub mod response;

pub use response::{CacheConfig, ResponseCache};
