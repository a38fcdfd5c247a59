//! Concurrency limiter with a bounded FIFO wait queue.
//!
//! At most [`LimiterConfig::max_concurrent`] calls run at once. Excess
//! callers wait in arrival order; once [`LimiterConfig::max_queue_size`]
//! callers are already waiting, further callers fail immediately with
//! [`HuginnError::QueueFull`] instead of blocking.
//!
//! The running count and the wait queue live under one lock. Releasing a
//! slot pops the head waiter and hands the slot to it directly, so the
//! waiter leaves the queue at the moment of hand-off rather than when its
//! task is next polled. A slot comes back on success, failure, panic, or
//! when the caller's future is dropped, including a waiter that was handed
//! a slot but went away before using it.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::telemetry;
use crate::{HuginnError, Result};

/// Configuration for the concurrency limiter.
///
/// ```rust
/// # use huginn::LimiterConfig;
/// let config = LimiterConfig::new().max_concurrent(8).max_queue_size(100);
/// ```
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Maximum number of calls running at once. Default: 4.
    pub max_concurrent: usize,
    /// Maximum number of callers waiting for a slot. Default: 50.
    pub max_queue_size: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_queue_size: 50,
        }
    }
}

impl LimiterConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of concurrent calls.
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set the maximum number of queued callers.
    pub fn max_queue_size(mut self, n: usize) -> Self {
        self.max_queue_size = n;
        self
    }
}

/// Bounds how many calls may be in flight at once.
pub struct ConcurrencyLimiter {
    slots: Mutex<Slots>,
    max_concurrent: usize,
    max_queue_size: usize,
}

struct Slots {
    active: usize,
    waiters: VecDeque<Waiter>,
    next_id: u64,
}

struct Waiter {
    id: u64,
    grant: oneshot::Sender<()>,
}

impl Slots {
    /// Give a freed slot to the head waiter, or return it to the pool.
    fn release(&mut self) {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.grant.send(()).is_ok() {
                return;
            }
        }
        self.active -= 1;
    }
}

impl ConcurrencyLimiter {
    /// Create a limiter from its configuration.
    pub fn new(config: &LimiterConfig) -> Self {
        Self {
            slots: Mutex::new(Slots {
                active: 0,
                waiters: VecDeque::new(),
                next_id: 0,
            }),
            max_concurrent: config.max_concurrent,
            max_queue_size: config.max_queue_size,
        }
    }

    /// Run `f` while holding a slot.
    ///
    /// Fails with [`HuginnError::QueueFull`] when every slot is taken and
    /// the wait queue is at capacity, and with [`HuginnError::Cancelled`]
    /// if `token` fires while waiting. Once `f` has started it is not
    /// interrupted by the limiter.
    pub async fn run<F, Fut, T>(&self, token: Option<&CancellationToken>, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self.acquire(token).await?;
        f().await
    }

    /// Number of slots currently held.
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Number of callers currently waiting for a slot.
    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Configured slot count.
    pub fn capacity(&self) -> usize {
        self.max_concurrent
    }

    async fn acquire(&self, token: Option<&CancellationToken>) -> Result<Permit<'_>> {
        if token.is_some_and(CancellationToken::is_cancelled) {
            metrics::counter!(telemetry::CANCELLATIONS_TOTAL).increment(1);
            return Err(HuginnError::Cancelled);
        }

        let mut queued = {
            let mut slots = self.lock();
            if slots.active < self.max_concurrent && slots.waiters.is_empty() {
                slots.active += 1;
                return Ok(Permit { limiter: self });
            }
            if slots.waiters.len() >= self.max_queue_size {
                let active = slots.active;
                drop(slots);
                metrics::counter!(telemetry::QUEUE_REJECTIONS_TOTAL).increment(1);
                debug!(queued = self.max_queue_size, active, "limiter queue full");
                return Err(HuginnError::QueueFull {
                    capacity: self.max_queue_size,
                });
            }
            let (grant, granted) = oneshot::channel();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.waiters.push_back(Waiter { id, grant });
            Queued {
                limiter: self,
                id,
                granted,
                settled: false,
            }
        };

        let granted = match token {
            Some(token) => tokio::select! {
                _ = token.cancelled() => {
                    metrics::counter!(telemetry::CANCELLATIONS_TOTAL).increment(1);
                    return Err(HuginnError::Cancelled);
                }
                granted = &mut queued.granted => granted,
            },
            None => (&mut queued.granted).await,
        };
        queued.settled = true;
        // Senders are only dropped unsent by dropping the limiter itself.
        granted.map_err(|_| HuginnError::Configuration("concurrency limiter closed".into()))?;
        Ok(Permit { limiter: self })
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A held slot, released on drop.
struct Permit<'a> {
    limiter: &'a ConcurrencyLimiter,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.lock().release();
    }
}

/// One caller's place in the wait queue until it is granted a slot.
///
/// Dropped unsettled (cancelled or abandoned), it leaves the queue. If the
/// slot was already handed over, it passes the slot on.
struct Queued<'a> {
    limiter: &'a ConcurrencyLimiter,
    id: u64,
    granted: oneshot::Receiver<()>,
    settled: bool,
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut slots = self.limiter.lock();
        match slots.waiters.iter().position(|w| w.id == self.id) {
            Some(index) => {
                slots.waiters.remove(index);
            }
            // Popped while our receiver was alive: the slot is ours.
            None => slots.release(),
        }
    }
}
