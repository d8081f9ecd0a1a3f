//! Minimum spacing between outbound requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Enforces a minimum interval between successive callers of [`acquire`].
///
/// The lock is held across the wait so two callers can never be released
/// inside the same interval, even when shared between tasks.
///
/// [`acquire`]: RateLimiter::acquire
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    jitter: Duration,
    last: Mutex<Option<Instant>>,
    acquisitions: AtomicU64,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            jitter: Duration::ZERO,
            last: Mutex::new(None),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Add up to `jitter` of random delay on top of the minimum interval.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Wait until the interval since the previous release has elapsed.
    /// The first call returns immediately.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;

        if let Some(previous) = *last {
            let deadline = previous + self.min_interval + self.random_jitter();
            if deadline > Instant::now() {
                tracing::trace!(
                    "Rate limiter waiting {:?}",
                    deadline.saturating_duration_since(Instant::now())
                );
                sleep_until(deadline).await;
            }
        }

        *last = Some(Instant::now());
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of times the limiter has released a caller.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    fn random_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = self.jitter.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
