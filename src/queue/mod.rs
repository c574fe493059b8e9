//! Rate-limited deduplicating workqueue
//!
//! Guarantees per-key serialization: a key handed to one worker is never
//! handed to another until `done` is called. A key re-added while in flight
//! is marked dirty and becomes available again after `done`, so updates are
//! coalesced instead of processed concurrently.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::Notify;
use tracing::trace;

/// Default base delay of the per-key exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// Default cap of the per-key exponential backoff.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);

#[derive(Default)]
struct QueueState {
    queue: VecDeque<String>,
    /// Keys waiting to be processed or re-processed; dedup set for `queue`.
    dirty: HashSet<String>,
    /// Keys currently handed out to a worker.
    processing: HashSet<String>,
    /// Per-key failure counts feeding the rate limiter.
    failures: HashMap<String, u32>,
    shutting_down: bool,
}

/// A thread-safe workqueue with deduplication, per-key serialization, and
/// per-key exponential backoff for failed items.
pub struct RateLimitingQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RateLimitingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitingQueue {
    /// Create a queue with the default backoff delays.
    pub fn new() -> Self {
        Self::with_delays(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }

    /// Create a queue with custom backoff base and cap.
    pub fn with_delays(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            base_delay,
            max_delay,
        }
    }

    /// Enqueue a key. Duplicates of a queued key coalesce; a key currently
    /// being processed is marked dirty and re-queued on [`done`](Self::done).
    pub fn add(&self, key: &str) {
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            if state.dirty.contains(key) {
                return;
            }
            state.dirty.insert(key.to_string());
            if state.processing.contains(key) {
                trace!(%key, "key re-added while in flight");
                return;
            }
            state.queue.push_back(key.to_string());
        }
        self.notify.notify_one();
    }

    /// Enqueue a key after a backoff computed from its failure count:
    /// exponential from the base delay, capped, with ±50% jitter.
    pub fn add_rate_limited(self: &Arc<Self>, key: &str) {
        let delay = {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            let failures = state.failures.entry(key.to_string()).or_insert(0);
            let exponent = (*failures).min(63);
            *failures += 1;

            let backoff = self.base_delay.as_secs_f64() * 2f64.powi(exponent as i32);
            let capped = backoff.min(self.max_delay.as_secs_f64());
            let jitter = rand::thread_rng().gen_range(0.5..1.5);
            Duration::from_secs_f64(capped * jitter)
        };
        self.add_after(key, delay);
    }

    /// Enqueue a key after a fixed delay.
    pub fn add_after(self: &Arc<Self>, key: &str, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        if self.state.lock().shutting_down {
            return;
        }

        let queue = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(&key);
        });
    }

    /// Block until a key is available and mark it in flight.
    ///
    /// Returns `None` once the queue is shutting down and drained.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    if !state.queue.is_empty() {
                        // Wake the next waiter for the remaining items.
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Release the in-flight mark for a key. If the key was re-added while
    /// in flight it becomes available again.
    pub fn done(&self, key: &str) {
        let requeued = {
            let mut state = self.state.lock();
            state.processing.remove(key);
            if state.dirty.contains(key) {
                state.queue.push_back(key.to_string());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_one();
        }
    }

    /// Clear the failure counter for a key.
    pub fn forget(&self, key: &str) {
        self.state.lock().failures.remove(key);
    }

    /// Number of rate-limited re-submissions recorded for a key.
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.state.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Number of keys currently available (not counting in-flight keys).
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns true if no key is currently available.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refuse further adds and wake all waiters. Already queued keys are
    /// still handed out so workers can drain.
    pub fn shut_down(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
        // A stored permit covers waiters that registered after the flag.
        self.notify.notify_one();
    }

    /// Returns true once [`shut_down`](Self::shut_down) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }
}
