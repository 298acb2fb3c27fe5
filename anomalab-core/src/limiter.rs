//! Sliding-window rate limiter shared across fetch workers.
//!
//! The limiter is the single synchronization point of the acquisition layer:
//! every provider call acquires one slot before its request is issued. The
//! admission invariant is exact — no trailing window of the configured length
//! ever contains more than `max_calls` admitted timestamps, across any number
//! of concurrent callers.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Rejected budget parameters. Reported at construction, before any network
/// activity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetError {
    #[error("max_calls must be positive")]
    ZeroCalls,

    #[error("window must be positive")]
    NonPositiveWindow,
}

/// Immutable call-quota configuration: at most `max_calls` admissions within
/// any trailing `window`.
#[derive(Debug, Clone, Copy)]
pub struct CallBudget {
    max_calls: usize,
    window: Duration,
}

impl CallBudget {
    pub fn new(max_calls: usize, window: Duration) -> Result<Self, BudgetError> {
        if max_calls == 0 {
            return Err(BudgetError::ZeroCalls);
        }
        if window.is_zero() {
            return Err(BudgetError::NonPositiveWindow);
        }
        Ok(Self { max_calls, window })
    }

    /// Budget over a one-minute rolling window.
    pub fn per_minute(max_calls: usize) -> Result<Self, BudgetError> {
        Self::new(max_calls, Duration::from_secs(60))
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Sliding-window admission control over a shared timestamp queue.
///
/// `acquire` blocks the calling thread until one more admission fits the
/// budget, then records it. The purge-then-admit step runs atomically under
/// one lock; waiters sleep until the oldest admission expires and re-check on
/// wake, since several callers may race for the freed slot. Fairness is not
/// strict FIFO, but every waiter is admitted once the window advances past
/// enough old admissions.
#[derive(Debug)]
pub struct RateLimiter {
    budget: CallBudget,
    admitted: Mutex<VecDeque<Instant>>,
    freed: Condvar,
}

impl RateLimiter {
    pub fn new(budget: CallBudget) -> Self {
        Self {
            budget,
            admitted: Mutex::new(VecDeque::with_capacity(budget.max_calls())),
            freed: Condvar::new(),
        }
    }

    pub fn budget(&self) -> CallBudget {
        self.budget
    }

    /// Block until admitting one more call keeps the trailing window at or
    /// under the budget, then record the admission and return.
    pub fn acquire(&self) {
        let mut admitted = self.admitted.lock().unwrap();
        loop {
            let now = Instant::now();

            // Drop admissions that have left the window.
            while admitted
                .front()
                .is_some_and(|t| now.duration_since(*t) >= self.budget.window)
            {
                admitted.pop_front();
            }

            if admitted.len() < self.budget.max_calls {
                admitted.push_back(now);
                return;
            }

            // Full: the oldest admission frees a slot when it ages out.
            // Sleep until then and re-check; another waiter may win the slot.
            let oldest = *admitted.front().expect("queue is at capacity");
            let wake_at = oldest + self.budget.window;
            let wait = wake_at.saturating_duration_since(now);
            if wait.is_zero() {
                continue;
            }
            let (guard, _) = self.freed.wait_timeout(admitted, wait).unwrap();
            admitted = guard;
        }
    }

    /// Number of admissions currently inside the trailing window.
    pub fn in_flight(&self) -> usize {
        let admitted = self.admitted.lock().unwrap();
        let now = Instant::now();
        admitted
            .iter()
            .filter(|t| now.duration_since(**t) < self.budget.window)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_calls_rejected() {
        assert_eq!(
            CallBudget::new(0, Duration::from_secs(1)).unwrap_err(),
            BudgetError::ZeroCalls
        );
    }

    #[test]
    fn zero_window_rejected() {
        assert_eq!(
            CallBudget::new(5, Duration::ZERO).unwrap_err(),
            BudgetError::NonPositiveWindow
        );
    }

    #[test]
    fn burst_under_limit_is_immediate() {
        let limiter = RateLimiter::new(CallBudget::new(5, Duration::from_secs(60)).unwrap());
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire();
        }
        // No admission had to wait for the window.
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(limiter.in_flight(), 5);
    }

    #[test]
    fn sixth_call_waits_for_window() {
        let limiter = RateLimiter::new(CallBudget::new(5, Duration::from_millis(200)).unwrap());
        let start = Instant::now();
        for _ in 0..6 {
            limiter.acquire();
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn window_rolls_forward() {
        let limiter = RateLimiter::new(CallBudget::new(2, Duration::from_millis(50)).unwrap());
        limiter.acquire();
        limiter.acquire();
        std::thread::sleep(Duration::from_millis(60));
        // Both admissions aged out; the next one is free.
        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_millis(20));
    }
}
