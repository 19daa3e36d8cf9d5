//! Bounded polling.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::trace;

/// Timing for a bounded poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Give up once this much time has passed.
    pub timeout: Duration,
    /// Delay before the second check.
    pub interval: Duration,
    /// Multiplier applied to the delay after each failed check (1.0 = fixed).
    pub backoff: f64,
    /// Upper bound on the delay.
    pub max_interval: Duration,
}

impl PollPolicy {
    /// Fixed-interval policy.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            backoff: 1.0,
            max_interval: interval,
        }
    }

    /// Grows the delay by `factor` after each miss, capped at `max_interval`.
    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff = factor.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff).min(self.max_interval)
    }
}

/// Checks `condition` until it returns true or the policy's timeout elapses.
///
/// The condition is always checked at least once. Returns whether it was
/// observed true; the caller decides what a timeout means.
pub async fn wait_until<F, Fut>(policy: PollPolicy, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut delay = policy.interval;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if condition().await {
            trace!(attempt, "poll condition met");
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            trace!(attempt, "poll timed out");
            return false;
        }
        sleep(delay.min(deadline - now)).await;
        delay = policy.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_returns_true_when_condition_met() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let policy = PollPolicy::new(Duration::from_secs(30), Duration::from_secs(2));

        let met = wait_until(policy, || {
            let counter = Arc::clone(&counter);
            async move { counter.fetch_add(1, Ordering::SeqCst) >= 2 }
        })
        .await;

        assert!(met);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_false_after_timeout() {
        let start = Instant::now();
        let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_secs(1));

        let met = wait_until(policy, || async { false }).await;

        assert!(!met);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_checks_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let policy = PollPolicy::new(Duration::ZERO, Duration::from_secs(1));

        let met = wait_until(policy, || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            }
        })
        .await;

        assert!(!met);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = PollPolicy::new(Duration::from_secs(60), Duration::from_secs(1))
            .with_backoff(2.0, Duration::from_secs(5));
        let mut d = policy.interval;
        let mut seen = Vec::new();
        for _ in 0..5 {
            d = policy.next_delay(d);
            seen.push(d.as_secs());
        }
        assert_eq!(seen, vec![2, 4, 5, 5, 5]);
    }
}
