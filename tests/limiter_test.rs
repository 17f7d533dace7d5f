//! Tests for [`RequestLimiter`] — admission control and batch driving.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use altgen::RequestLimiter;

/// Tracks concurrent entries into an instrumented operation.
#[derive(Default)]
struct Gauge {
    active: AtomicU32,
    peak: AtomicU32,
}

impl Gauge {
    async fn enter(&self, hold: Duration) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn never_exceeds_concurrency_bound() {
    let limiter = RequestLimiter::new(2, Duration::ZERO);
    let gauge = Arc::new(Gauge::default());

    let urls: Vec<String> = (0..5).map(|i| format!("u{i}")).collect();
    let results = limiter
        .process_batches(&urls, |url| {
            let gauge = gauge.clone();
            async move {
                gauge.enter(Duration::from_millis(20)).await;
                url.clone()
            }
        })
        .await;

    assert_eq!(results.len(), 5);
    assert!(gauge.peak() <= 2, "peak was {}", gauge.peak());
}

#[tokio::test]
async fn results_preserve_input_order() {
    let limiter = RequestLimiter::new(3, Duration::ZERO);

    let items: Vec<u32> = (0..10).collect();
    let results = limiter
        .process_batches(&items, |n| {
            let n = *n;
            async move {
                // Later items finish earlier; order must still hold.
                tokio::time::sleep(Duration::from_millis((10 - n) as u64)).await;
                n * 2
            }
        })
        .await;

    assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
}

#[tokio::test]
async fn per_item_failures_never_fail_the_batch() {
    let limiter = RequestLimiter::new(2, Duration::ZERO);

    let items: Vec<u32> = (0..6).collect();
    let results: Vec<Result<u32, String>> = limiter
        .process_batches(&items, |n| {
            let n = *n;
            async move {
                if n % 2 == 0 {
                    Ok(n)
                } else {
                    Err(format!("item {n} failed"))
                }
            }
        })
        .await;

    assert_eq!(results.len(), items.len());
    assert_eq!(results[0], Ok(0));
    assert_eq!(results[1], Err("item 1 failed".to_string()));
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 3);
}

#[tokio::test]
async fn empty_input_yields_empty_output() {
    let limiter = RequestLimiter::new(4, Duration::from_millis(100));
    let items: Vec<String> = vec![];

    let results = limiter
        .process_batches(&items, |s| async move { s.clone() })
        .await;

    assert!(results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn batches_are_separated_by_the_configured_delay() {
    let limiter = RequestLimiter::new(2, Duration::from_millis(500));

    let items: Vec<u32> = (0..4).collect();
    let start = tokio::time::Instant::now();
    let results = limiter
        .process_batches(&items, |n| {
            let n = *n;
            async move { n }
        })
        .await;

    // Two batches, one inter-batch delay. With the clock paused, elapsed
    // time is exactly the slept amount.
    assert_eq!(results.len(), 4);
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert!(start.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn run_bounds_direct_callers_too() {
    let limiter = RequestLimiter::new(1, Duration::ZERO);
    let gauge = Arc::new(Gauge::default());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let limiter = limiter.clone();
        let gauge = gauge.clone();
        handles.push(tokio::spawn(async move {
            limiter
                .run(gauge.enter(Duration::from_millis(10)))
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(gauge.peak(), 1);
}
