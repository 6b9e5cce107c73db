//! Bounded worker pool draining a [`WorkQueue`].

use crate::queue::WorkQueue;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default worker count when the operator does not override it.
pub const DEFAULT_WORKERS: usize = 8;

/// What a reconcile call asks the scheduler to do with its key next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerOutcome {
    /// Reconciliation reached a stable state; no further action needed
    /// unless something re-triggers the key.
    Done,
    /// Reconciliation is incomplete; run the key again after `Duration`
    RequeueAfter(Duration),
}

/// Spawns `workers` tasks, each looping: dequeue a key, run `reconcile`,
/// mark it complete, and honor any requested requeue.
pub fn spawn<K, F, Fut>(queue: Arc<WorkQueue<K>>, workers: usize, reconcile: F) -> Vec<JoinHandle<()>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    F: Fn(K) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = SchedulerOutcome> + Send + 'static,
{
    (0..workers.max(1))
        .map(|_| {
            let queue = Arc::clone(&queue);
            let reconcile = reconcile.clone();
            tokio::spawn(async move {
                loop {
                    let key = queue.dequeue().await;
                    let outcome = reconcile(key.clone()).await;
                    queue.complete(&key).await;
                    if let SchedulerOutcome::RequeueAfter(delay) = outcome {
                        queue.enqueue_after(key, delay).await;
                    }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn workers_drain_enqueued_keys() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new());
        let seen = Arc::new(AtomicUsize::new(0));

        for key in 0..4u32 {
            queue.enqueue(key).await;
        }

        let seen_clone = Arc::clone(&seen);
        let handles = spawn(Arc::clone(&queue), 2, move |_key| {
            let seen = Arc::clone(&seen_clone);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                SchedulerOutcome::Done
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        for handle in handles {
            handle.abort();
        }

        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn requeue_after_schedules_another_pass() {
        let queue: Arc<WorkQueue<&'static str>> = Arc::new(WorkQueue::new());
        queue.enqueue("a").await;

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let handles = spawn(Arc::clone(&queue), 1, move |_key| {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    SchedulerOutcome::RequeueAfter(Duration::from_secs(1))
                } else {
                    SchedulerOutcome::Done
                }
            }
        });

        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        for handle in handles {
            handle.abort();
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
