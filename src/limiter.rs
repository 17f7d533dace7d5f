//! Admission control for enrichment calls.
//!
//! [`RequestLimiter`] bounds the number of simultaneously in-flight
//! operations with a semaphore (permits are granted in acquire order, which
//! preserves FIFO overflow behaviour) and drives batched processing: items
//! are grouped into batches of the concurrency limit, each batch is launched
//! together and fully drained before a short fixed delay and the next batch,
//! so peak concurrency never exceeds the configured maximum.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

/// Bounds in-flight operations and batches larger workloads.
#[derive(Clone)]
pub struct RequestLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    batch_delay: Duration,
}

impl RequestLimiter {
    /// Create a limiter allowing `max_concurrent` in-flight operations,
    /// pausing `batch_delay` between batches.
    pub fn new(max_concurrent: usize, batch_delay: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            batch_delay,
        }
    }

    /// Run one operation under a concurrency permit.
    ///
    /// Waits (FIFO) when the limiter is at capacity. The permit is held for
    /// the whole operation, success or failure.
    pub async fn run<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("limiter semaphore closed");
        fut.await
    }

    /// Process all items with bounded concurrency, preserving input order.
    ///
    /// Items are chunked into batches of the concurrency limit; within a
    /// batch everything runs concurrently and is awaited together. `f` is
    /// infallible by contract — per-item failures must be encoded in `T`
    /// (a result field), never thrown across the batch boundary.
    pub async fn process_batches<'a, I, F, Fut, T>(&self, items: &'a [I], f: F) -> Vec<T>
    where
        F: Fn(&'a I) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut results = Vec::with_capacity(items.len());
        let mut batches = items.chunks(self.max_concurrent).peekable();

        while let Some(batch) = batches.next() {
            let outcomes = join_all(batch.iter().map(|item| self.run(f(item)))).await;
            results.extend(outcomes);

            // Rate-limit courtesy pause, skipped after the final batch.
            if batches.peek().is_some() && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        results
    }

    /// The configured concurrency limit.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
