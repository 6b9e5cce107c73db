//! Per-key dedup/delay work queue: at most one in-flight
//! reconciliation per resource key, concurrent triggers while a key is
//! in-flight coalesce into a single re-run, and a per-key token bucket caps
//! how often any one key may be reconciled.
//!
//! Built on a `DelayQueue` + `HashMap` dedup design (`scheduled` holds the
//! canonical "when does this key next run" entry, the `DelayQueue` just
//! drives expiry), composed with `governor`'s keyed rate limiter for the
//! per-key token bucket.

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use hashbrown::HashMap;
use std::collections::HashSet;
use std::hash::Hash;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::time::DelayQueue;

/// Burst size and refill rate of the per-key token bucket.
const BUCKET_BURST: u32 = 10;
const BUCKET_REFILL_PER_SEC: u32 = 1;

fn default_quota() -> Quota {
    Quota::per_second(NonZeroU32::new(BUCKET_REFILL_PER_SEC).expect("nonzero"))
        .allow_burst(NonZeroU32::new(BUCKET_BURST).expect("nonzero"))
}

struct Inner<K> {
    queue: DelayQueue<K>,
    /// Canonical "next run" entry per scheduled key; always consult this
    /// before trusting anything popped out of `queue`.
    scheduled: HashMap<K, tokio_util::time::delay_queue::Key>,
    /// Keys with a reconciliation currently checked out by a worker.
    in_flight: HashSet<K>,
    /// Keys that were re-triggered while in flight; re-enqueued exactly
    /// once on [`WorkQueue::complete`].
    dirty: HashSet<K>,
}

/// A dedup + delay queue wrapping a per-key token bucket.
pub struct WorkQueue<K: Eq + Hash + Clone + Send + Sync + 'static> {
    inner: Mutex<Inner<K>>,
    limiter: RateLimiter<K, DefaultKeyedStateStore<K>, DefaultClock>,
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> Default for WorkQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> WorkQueue<K> {
    pub fn new() -> Self {
        WorkQueue {
            inner: Mutex::new(Inner {
                queue: DelayQueue::new(),
                scheduled: HashMap::new(),
                in_flight: HashSet::new(),
                dirty: HashSet::new(),
            }),
            limiter: RateLimiter::keyed(default_quota()),
        }
    }

    /// Schedule `key` to run as soon as its token bucket allows. If `key`
    /// is already in flight, marks it dirty instead of double-scheduling
    pub async fn enqueue(&self, key: K) {
        self.enqueue_after(key, Duration::ZERO).await;
    }

    /// Schedule `key` to run no earlier than `delay` from now.
    pub async fn enqueue_after(&self, key: K, delay: Duration) {
        let mut inner = self.inner.lock().await;
        if inner.in_flight.contains(&key) {
            inner.dirty.insert(key);
            return;
        }

        let run_at = Instant::now() + delay;
        if let Some(existing) = inner.scheduled.get(&key).copied() {
            // Earlier request wins.
            if inner.queue.deadline(&existing) > run_at {
                inner.queue.reset_at(&existing, run_at);
            }
        } else {
            let queue_key = inner.queue.insert_at(key.clone(), run_at);
            inner.scheduled.insert(key, queue_key);
        }
    }

    /// Pop the next key that is both expired and within its rate budget,
    /// marking it in-flight. Keys that are expired but rate-limited are
    /// rescheduled for when the bucket refills rather than dropped.
    pub async fn dequeue(&self) -> K {
        loop {
            let key = self.next_expired().await;

            match self.limiter.check_key(&key) {
                Ok(()) => {
                    let mut inner = self.inner.lock().await;
                    inner.in_flight.insert(key.clone());
                    return key;
                }
                Err(not_until) => {
                    let wait = not_until.wait_time_from(DefaultClock::default().now());
                    self.enqueue_after(key, wait).await;
                }
            }
        }
    }

    /// Mark `key` as finished. If it was re-triggered while in flight,
    /// re-enqueue it immediately exactly once.
    pub async fn complete(&self, key: &K) {
        let was_dirty = {
            let mut inner = self.inner.lock().await;
            inner.in_flight.remove(key);
            inner.dirty.remove(key)
        };
        if was_dirty {
            self.enqueue(key.clone()).await;
        }
    }

    /// Await the next expired entry without holding the queue lock across
    /// the pending wait, so `enqueue`/`enqueue_after`/`complete` can still
    /// make progress (and in turn wake this poll) while nothing is due.
    async fn next_expired(&self) -> K {
        std::future::poll_fn(|cx| {
            let Ok(mut inner) = self.inner.try_lock() else {
                cx.waker().wake_by_ref();
                return std::task::Poll::Pending;
            };
            match inner.queue.poll_expired(cx) {
                std::task::Poll::Ready(Some(Ok(expired))) => {
                    let key = expired.into_inner();
                    inner.scheduled.remove(&key);
                    std::task::Poll::Ready(key)
                }
                std::task::Poll::Ready(Some(Err(_))) | std::task::Poll::Ready(None) => {
                    cx.waker().wake_by_ref();
                    std::task::Poll::Pending
                }
                std::task::Poll::Pending => std::task::Poll::Pending,
            }
        })
        .await
    }

    #[cfg(test)]
    pub(crate) async fn is_in_flight(&self, key: &K) -> bool {
        self.inner.lock().await.in_flight.contains(key)
    }
}
