//! Concurrency tests for the sliding-window rate limiter.
//!
//! These use real threads and real time; windows are kept short where the
//! property allows it, and tolerances account for scheduler jitter.

use anomalab_core::limiter::{CallBudget, RateLimiter};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Spawn `callers` threads, each acquiring once, and return the post-acquire
/// timestamps in admission order.
fn acquire_concurrently(limiter: Arc<RateLimiter>, callers: usize) -> Vec<Instant> {
    let mut handles = Vec::new();
    for _ in 0..callers {
        let limiter = Arc::clone(&limiter);
        handles.push(std::thread::spawn(move || {
            limiter.acquire();
            Instant::now()
        }));
    }
    let mut stamps: Vec<Instant> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    stamps.sort();
    stamps
}

#[test]
fn five_concurrent_callers_with_budget_three_take_at_least_one_window() {
    let budget = CallBudget::new(3, Duration::from_secs(1)).unwrap();
    let limiter = Arc::new(RateLimiter::new(budget));

    let start = Instant::now();
    acquire_concurrently(limiter, 5);
    let elapsed = start.elapsed();

    // ceil(5/3) - 1 = 1 full window must pass before calls 4 and 5.
    // Small slack for the gap between admission and the start timestamp.
    assert!(
        elapsed >= Duration::from_millis(990),
        "5 acquisitions finished in {elapsed:?}, before the window advanced"
    );
    assert!(elapsed < Duration::from_secs(3), "took far too long: {elapsed:?}");
}

#[test]
fn no_trailing_window_ever_exceeds_the_budget() {
    let max_calls = 2;
    let window = Duration::from_millis(500);
    let budget = CallBudget::new(max_calls, window).unwrap();
    let limiter = Arc::new(RateLimiter::new(budget));

    let stamps = acquire_concurrently(limiter, 8);
    assert_eq!(stamps.len(), 8);

    // If admission i and admission i+max_calls both happened, the window must
    // have advanced between them. Post-acquire timestamps lag the internal
    // admission instants by scheduling jitter only, so allow a small slack.
    let jitter = Duration::from_millis(100);
    for pair in stamps.windows(max_calls + 1) {
        let gap = pair[max_calls].duration_since(pair[0]);
        assert!(
            gap >= window.saturating_sub(jitter),
            "admissions {:?} apart violate the {window:?} window",
            gap
        );
    }
}

#[test]
fn burst_within_budget_is_not_delayed() {
    let budget = CallBudget::new(8, Duration::from_secs(60)).unwrap();
    let limiter = Arc::new(RateLimiter::new(budget));

    let start = Instant::now();
    acquire_concurrently(limiter, 8);
    assert!(start.elapsed() < Duration::from_millis(250));
}

#[test]
fn every_waiter_is_eventually_admitted() {
    let budget = CallBudget::new(1, Duration::from_millis(20)).unwrap();
    let limiter = Arc::new(RateLimiter::new(budget));

    // 10 callers through a 1-wide window: all must complete.
    let stamps = acquire_concurrently(limiter, 10);
    assert_eq!(stamps.len(), 10);
}
