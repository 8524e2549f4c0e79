//! Concurrency and rate limiting tests for the submission pool.

use presto_adapter::{AdapterError, ConcurrencyLimitedPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

// ============================================================================
// Test Helpers
// ============================================================================

/// Tracks how many instrumented generators run at once
#[derive(Default)]
struct Probe {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Probe {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Concurrency limit
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_limit() {
    let pool = ConcurrencyLimitedPool::new(3, 0, Duration::ZERO);
    let probe = Arc::new(Probe::default());

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let probe = Arc::clone(&probe);
            pool.submit(move || async move {
                probe.enter();
                tokio::time::sleep(Duration::from_millis(20)).await;
                probe.exit();
                Ok(i)
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert_eq!(results, (0..12).collect::<Vec<_>>());
    assert!(probe.peak() <= 3, "peak {} exceeded limit", probe.peak());
    assert!(probe.peak() >= 1);

    let stats = pool.stats();
    assert!(stats.peak_active <= 3);
    assert_eq!(stats.started, 12);
    assert_eq!(stats.completed, 12);
    assert_eq!(stats.active, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_slot_runs_in_submission_order() {
    for round in 0..20 {
        let pool = ConcurrencyLimitedPool::new(1, 0, Duration::ZERO);
        let order = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.submit(move || async move {
                    order.lock().await.push(i);
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let order = order.lock().await.clone();
        assert_eq!(order, (0..50).collect::<Vec<_>>(), "round {round} started out of order");
    }
}

// ============================================================================
// Frequency limit
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_frequency_limit_throttles_bursts() {
    let window = Duration::from_millis(150);
    let pool = ConcurrencyLimitedPool::new(10, 3, window);
    let starts = Arc::new(Mutex::new(Vec::new()));
    let began = Instant::now();

    let handles: Vec<_> = (0..9)
        .map(|_| {
            let starts = Arc::clone(&starts);
            pool.submit(move || async move {
                starts.lock().await.push(Instant::now());
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let mut starts = starts.lock().await.clone();
    starts.sort();
    assert_eq!(starts.len(), 9);

    // 9 starts at 3 per window need at least two full windows
    assert!(began.elapsed() >= window * 2);

    // No window (minus scheduling slack) holds more than 3 starts
    let slack = Duration::from_millis(20);
    for (i, first) in starts.iter().enumerate() {
        let in_window = starts[i..]
            .iter()
            .filter(|s| s.duration_since(*first) < window - slack)
            .count();
        assert!(in_window <= 3, "{in_window} starts within one window");
    }
}

#[tokio::test]
async fn test_frequency_limit_applies_with_free_slots() {
    let window = Duration::from_millis(100);
    let pool = ConcurrencyLimitedPool::new(100, 1, window);
    let began = Instant::now();

    let handles: Vec<_> = (0..3).map(|_| pool.submit(|| async { Ok(()) })).collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(began.elapsed() >= window * 2);
}

#[tokio::test]
async fn test_zero_frequency_limit_disables_throttle() {
    let pool = ConcurrencyLimitedPool::new(10, 0, Duration::from_secs(60));
    let began = Instant::now();
    let handles: Vec<_> = (0..20).map(|_| pool.submit(|| async { Ok(()) })).collect();
    for handle in handles {
        handle.await.unwrap();
    }
    assert!(began.elapsed() < Duration::from_secs(5));
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_abort_does_not_affect_siblings() {
    let pool = ConcurrencyLimitedPool::new(1, 0, Duration::ZERO);

    let stuck = pool.submit(|| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("stuck")
    });
    let second = pool.submit(|| async { Ok("second") });
    let third = pool.submit(|| async { Ok("third") });

    tokio::time::sleep(Duration::from_millis(10)).await;
    stuck.abort();

    assert!(matches!(stuck.await, Err(AdapterError::Cancelled)));
    assert_eq!(second.await.unwrap(), "second");
    assert_eq!(third.await.unwrap(), "third");
}

#[tokio::test]
async fn test_abort_while_queued_skips_task() {
    let pool = ConcurrencyLimitedPool::new(1, 0, Duration::ZERO);
    let ran = Arc::new(AtomicUsize::new(0));

    let first = pool.submit(|| async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(1)
    });
    let queued = {
        let ran = Arc::clone(&ran);
        pool.submit(move || async move {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(2)
        })
    };
    let last = pool.submit(|| async { Ok(3) });

    queued.abort();

    assert!(matches!(queued.await, Err(AdapterError::Cancelled)));
    assert_eq!(first.await.unwrap(), 1);
    assert_eq!(last.await.unwrap(), 3);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(pool.stats().started, 2);
}

#[tokio::test]
async fn test_failing_tasks_release_slots() {
    let pool = ConcurrencyLimitedPool::new(2, 0, Duration::ZERO);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            pool.submit(move || async move {
                if i % 2 == 0 {
                    Err(AdapterError::Transport(format!("task {i} failed")))
                } else {
                    Ok(i)
                }
            })
        })
        .collect();

    let mut ok = 0;
    let mut failed = 0;
    for handle in handles {
        match handle.await {
            Ok(_) => ok += 1,
            Err(AdapterError::Transport(_)) => failed += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!((ok, failed), (3, 3));
    let stats = pool.stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn test_close_waits_for_running_tasks() {
    let pool = ConcurrencyLimitedPool::new(2, 0, Duration::ZERO);
    let finished = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let finished = Arc::clone(&finished);
            pool.submit(move || async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(5)).await;
    pool.close().await;

    assert_eq!(finished.load(Ordering::SeqCst), 4);
    for handle in handles {
        handle.await.unwrap();
    }
}
