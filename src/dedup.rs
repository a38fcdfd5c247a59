//! Collapses concurrent identical requests into one underlying call.
//!
//! The first caller for a key creates an in-flight entry holding a
//! [`Shared`] future of the call's outcome; later callers for the same key
//! await a clone of that future instead of starting their own call, so
//! every waiter observes the same value or the same error.
//!
//! The entry is removed as soon as the call settles, success or failure,
//! so the next caller after completion starts a fresh call. If every
//! waiter goes away before the call settles, the entry is removed too and
//! the call is dropped with it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt as _;
use futures_util::future::{BoxFuture, Shared};
use tracing::debug;

use crate::Result;
use crate::telemetry;

type SharedOutcome<V> = Shared<BoxFuture<'static, Result<V>>>;

struct InFlight<V> {
    id: u64,
    outcome: SharedOutcome<V>,
    waiters: usize,
}

type InFlightMap<V> = Arc<Mutex<HashMap<String, InFlight<V>>>>;

/// In-flight request table. At most one entry exists per key.
pub struct Deduplicator<V> {
    in_flight: InFlightMap<V>,
    next_id: AtomicU64,
}

impl<V> Default for Deduplicator<V> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<V> Deduplicator<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the in-flight outcome for `key`, starting `f()` if there is none.
    ///
    /// `f` is only invoked by the caller that creates the entry.
    pub async fn share<F, Fut>(&self, key: &str, f: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (id, outcome) = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get_mut(key) {
                Some(entry) => {
                    entry.waiters += 1;
                    metrics::counter!(telemetry::DEDUP_JOINS_TOTAL).increment(1);
                    debug!(key, waiters = entry.waiters, "joining in-flight request");
                    (entry.id, entry.outcome.clone())
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let outcome = settle(Arc::clone(&self.in_flight), key.to_owned(), id, f());
                    in_flight.insert(
                        key.to_owned(),
                        InFlight {
                            id,
                            outcome: outcome.clone(),
                            waiters: 1,
                        },
                    );
                    (id, outcome)
                }
            }
        };

        let _waiter = Waiter {
            in_flight: &self.in_flight,
            key,
            id,
        };
        outcome.await
    }

    /// Number of keys with a call in flight.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Number of callers awaiting `key`, or `None` if nothing is in flight.
    pub fn waiters(&self, key: &str) -> Option<usize> {
        lock(&self.in_flight).get(key).map(|entry| entry.waiters)
    }
}

/// Wrap the call so that it removes its own entry the moment it settles,
/// before any waiter is woken with the outcome.
fn settle<V, Fut>(in_flight: InFlightMap<V>, key: String, id: u64, call: Fut) -> SharedOutcome<V>
where
    V: Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    async move {
        let outcome = call.await;
        remove_entry(&in_flight, &key, id);
        outcome
    }
    .boxed()
    .shared()
}

fn remove_entry<V>(in_flight: &InFlightMap<V>, key: &str, id: u64) {
    let mut in_flight = lock(in_flight);
    if in_flight.get(key).is_some_and(|entry| entry.id == id) {
        in_flight.remove(key);
    }
}

/// One caller's interest in an in-flight entry. The last waiter to leave
/// an unsettled entry removes it.
struct Waiter<'a, V> {
    in_flight: &'a InFlightMap<V>,
    key: &'a str,
    id: u64,
}

impl<V> Drop for Waiter<'_, V> {
    fn drop(&mut self) {
        let mut in_flight = lock(self.in_flight);
        let abandoned = match in_flight.get_mut(self.key) {
            Some(entry) if entry.id == self.id => {
                entry.waiters -= 1;
                entry.waiters == 0
            }
            _ => false,
        };
        if abandoned {
            debug!(key = self.key, "all waiters gone, dropping in-flight request");
            in_flight.remove(self.key);
        }
    }
}

fn lock<V>(in_flight: &InFlightMap<V>) -> MutexGuard<'_, HashMap<String, InFlight<V>>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}
