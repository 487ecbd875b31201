//! Per-job execution context: bounded worker pool, completion barrier, and
//! failure aggregation.
//!
//! Units of work may themselves submit follow-up units (retries, media
//! uploads, persistence), so the barrier cannot be a one-shot join: it keeps
//! re-scanning the pending set until a scan finds it empty.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Worker pool width used when the config does not override it.
pub const DEFAULT_WORKER_COUNT: usize = 15;

/// How long a single barrier scan waits on one handle before re-scanning.
const DRAIN_WAIT: Duration = Duration::from_secs(2);

pub struct JobContext {
    workers: Arc<Semaphore>,
    pending: Mutex<VecDeque<JoinHandle<()>>>,
    failed: Mutex<BTreeSet<String>>,
    started_at: Instant,
}

impl JobContext {
    pub fn new(worker_count: usize) -> Arc<Self> {
        Arc::new(Self {
            workers: Arc::new(Semaphore::new(worker_count)),
            pending: Mutex::new(VecDeque::new()),
            failed: Mutex::new(BTreeSet::new()),
            started_at: Instant::now(),
        })
    }

    /// Submit a unit of work. The unit runs once a worker permit is free;
    /// submission itself never blocks, so units can enqueue follow-ups from
    /// inside the pool without deadlocking on it.
    pub fn submit(&self, unit: BoxFuture<'static, ()>) {
        let workers = Arc::clone(&self.workers);
        let handle = tokio::spawn(async move {
            // the semaphore is never closed
            if let Ok(_permit) = workers.acquire_owned().await {
                unit.await;
            }
        });
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .push_back(handle);
    }

    /// Record a token id as permanently failed. Returns false when the id
    /// was already recorded, so callers can avoid double-counting.
    pub fn record_failure(&self, token_id: &str) -> bool {
        self.failed
            .lock()
            .expect("failed lock poisoned")
            .insert(token_id.to_owned())
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failed
            .lock()
            .expect("failed lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending lock poisoned").len()
    }

    /// Completion barrier: returns once every submitted unit, including
    /// units submitted while draining, has finished.
    pub async fn drain(&self) {
        loop {
            let next = self
                .pending
                .lock()
                .expect("pending lock poisoned")
                .pop_front();

            if let Some(mut handle) = next {
                match tokio::time::timeout(DRAIN_WAIT, &mut handle).await {
                    Ok(Err(join_error)) if join_error.is_panic() => {
                        tracing::warn!(
                            target: "publisher_core::context",
                            error = %join_error,
                            "unit of work panicked"
                        );
                    }
                    Ok(_) => {}
                    Err(_) => {
                        // still running, re-queue and look at the rest
                        self.pending
                            .lock()
                            .expect("pending lock poisoned")
                            .push_front(handle);
                    }
                }
            }

            let mut pending = self.pending.lock().expect("pending lock poisoned");
            pending.retain(|handle| !handle.is_finished());
            if pending.is_empty() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_drain_waits_for_all_units() {
        let ctx = JobContext::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            ctx.submit(Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        ctx.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(ctx.pending_len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_drain_covers_late_submitted_units() {
        let ctx = JobContext::new(4);
        let done = Arc::new(AtomicUsize::new(0));

        let inner_ctx = Arc::clone(&ctx);
        let inner_done = Arc::clone(&done);
        ctx.submit(Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let nested_done = Arc::clone(&inner_done);
            inner_ctx.submit(Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                nested_done.fetch_add(1, Ordering::SeqCst);
            }));
            inner_done.fetch_add(1, Ordering::SeqCst);
        }));

        ctx.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_drain_survives_panicking_unit() {
        let ctx = JobContext::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        ctx.submit(Box::pin(async {
            panic!("boom");
        }));
        let unit_done = Arc::clone(&done);
        ctx.submit(Box::pin(async move {
            unit_done.fetch_add(1, Ordering::SeqCst);
        }));

        ctx.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_record_failure_deduplicates() {
        let ctx = JobContext::new(1);
        assert!(ctx.record_failure("7"));
        assert!(!ctx.record_failure("7"));
        assert!(ctx.record_failure("8"));
        assert_eq!(ctx.failed_ids(), vec!["7".to_owned(), "8".to_owned()]);
    }
}
