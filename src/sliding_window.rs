//! Sliding window counter limiter (approximate)
//!
//! Tracks two adjacent window-length slots and weighs the previous slot's
//! count by how much of it still overlaps the sliding window:
//!
//! ```text
//!     estimate = prev × (1 − elapsed/window) + curr
//! ```
//!
//! O(1) memory and within one slot's worth of the exact count, which is
//! the right trade for high-throughput keys. Use [`crate::sliding_log`]
//! when exactness matters more than memory.

use crate::limiter::{Limiter, LimiterStats};
use crate::{ConfigError, LimitError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const ALGORITHM: &str = "SlidingWindow";

/// Poll cadence used while blocked in `acquire` when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for [`SlidingWindowLimiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingWindowConfig {
    /// Admissions allowed per sliding window.
    pub max_permits: u64,
    /// Window length.
    pub window_duration: Duration,
    /// How often a blocked `acquire` re-checks the estimate.
    pub poll_interval: Duration,
}

impl SlidingWindowConfig {
    /// Create a configuration with the default poll interval.
    pub fn new(max_permits: u64, window_duration: Duration) -> Self {
        Self { max_permits, window_duration, poll_interval: DEFAULT_POLL_INTERVAL }
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_permits == 0 {
            return Err(ConfigError::ZeroCount("max_permits"));
        }
        if self.window_duration.is_zero() {
            return Err(ConfigError::ZeroDuration("window_duration"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll_interval"));
        }
        Ok(())
    }
}

struct SlotState {
    prev: u64,
    curr: u64,
    slot_start: Instant,
    acquired: u64,
    rejected: u64,
    disposed: bool,
}

/// Approximate sliding window limiter over two counter slots.
pub struct SlidingWindowLimiter {
    state: Mutex<SlotState>,
    max_permits: u64,
    window: Duration,
    poll_interval: Duration,
}

impl SlidingWindowLimiter {
    /// Create a limiter. Fails if any parameter violates its constraint.
    pub fn new(config: SlidingWindowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(SlotState {
                prev: 0,
                curr: 0,
                slot_start: Instant::now(),
                acquired: 0,
                rejected: 0,
                disposed: false,
            }),
            max_permits: config.max_permits,
            window: config.window_duration,
            poll_interval: config.poll_interval,
        })
    }

    /// Rotate slots when a full window has passed. After two or more idle
    /// slots the previous count no longer overlaps the window and is
    /// discarded outright.
    fn advance(&self, s: &mut SlotState) {
        let now = Instant::now();
        let elapsed = now.duration_since(s.slot_start);
        if elapsed >= self.window {
            let slots = (elapsed.as_nanos() / self.window.as_nanos()) as u64;
            s.prev = if slots >= 2 { 0 } else { s.curr };
            s.curr = 0;
            s.slot_start += mul_duration(self.window, slots);
        }
    }

    fn estimate(&self, s: &SlotState) -> f64 {
        let elapsed = Instant::now().duration_since(s.slot_start);
        let overlap = 1.0 - elapsed.as_secs_f64() / self.window.as_secs_f64();
        s.prev as f64 * overlap.clamp(0.0, 1.0) + s.curr as f64
    }

    fn time_to_next_slot(&self, s: &SlotState) -> Duration {
        (s.slot_start + self.window).duration_since(Instant::now())
    }
}

fn mul_duration(d: Duration, times: u64) -> Duration {
    Duration::from_nanos((d.as_nanos() as u64).saturating_mul(times))
}

#[async_trait]
impl Limiter for SlidingWindowLimiter {
    fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    fn try_acquire(&self) -> Result<bool, LimitError> {
        let mut s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        self.advance(&mut s);
        if self.estimate(&s) < self.max_permits as f64 {
            s.curr += 1;
            s.acquired += 1;
            Ok(true)
        } else {
            s.rejected += 1;
            debug!("sliding window rejected request");
            Ok(false)
        }
    }

    async fn acquire(&self, timeout: Option<Duration>) -> Result<(), LimitError> {
        let fail_fast = matches!(timeout, Some(t) if t.is_zero());
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let next_slot = {
                let mut s = self.state.lock().unwrap();
                if s.disposed {
                    return Err(LimitError::Disposed);
                }
                self.advance(&mut s);
                if self.estimate(&s) < self.max_permits as f64 {
                    s.curr += 1;
                    s.acquired += 1;
                    return Ok(());
                }
                self.time_to_next_slot(&s)
            };

            let now = Instant::now();
            let expired = fail_fast || matches!(deadline, Some(d) if now >= d);
            if expired {
                let mut s = self.state.lock().unwrap();
                if s.disposed {
                    return Err(LimitError::Disposed);
                }
                s.rejected += 1;
                debug!("sliding window acquire timed out");
                return Err(LimitError::deadline(ALGORITHM, Some(self.time_to_next_slot(&s))));
            }

            let mut wake = now + next_slot.min(self.poll_interval);
            if let Some(d) = deadline {
                wake = wake.min(d);
            }
            tokio::time::sleep_until(wake).await;
        }
    }

    fn stats(&self) -> Result<LimiterStats, LimitError> {
        let mut s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        self.advance(&mut s);
        let used = (self.estimate(&s).ceil() as u64).min(self.max_permits);
        Ok(LimiterStats {
            permits_acquired: s.acquired,
            permits_rejected: s.rejected,
            current_permits: self.max_permits - used,
            max_permits: self.max_permits,
            queue_depth: 0,
        })
    }

    fn release(&self) -> Result<(), LimitError> {
        let s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        Ok(())
    }

    fn shutdown(&self) {
        let mut s = self.state.lock().unwrap();
        if s.disposed {
            return;
        }
        s.disposed = true;
        debug!("sliding window limiter shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_max_in_first_slot() {
        let limiter =
            SlidingWindowLimiter::new(SlidingWindowConfig::new(3, Duration::from_secs(600)))
                .unwrap();
        for _ in 0..3 {
            assert!(limiter.try_acquire().unwrap());
        }
        assert!(!limiter.try_acquire().unwrap());

        let stats = limiter.stats().unwrap();
        assert_eq!(stats.permits_acquired, 3);
        assert_eq!(stats.permits_rejected, 1);
        assert_eq!(stats.current_permits, 0);
    }

    #[tokio::test]
    async fn previous_slot_weight_decays() {
        let limiter =
            SlidingWindowLimiter::new(SlidingWindowConfig::new(2, Duration::from_millis(200)))
                .unwrap();
        assert!(limiter.try_acquire().unwrap());
        assert!(limiter.try_acquire().unwrap());
        assert!(!limiter.try_acquire().unwrap());

        // Early in the next slot the previous count still dominates:
        // estimate = 2 × (1 − elapsed/window), leaving room for exactly one.
        tokio::time::sleep(Duration::from_millis(220)).await;
        assert!(limiter.try_acquire().unwrap());
        assert!(!limiter.try_acquire().unwrap());
    }

    #[tokio::test]
    async fn long_idle_discards_previous_slot() {
        let limiter =
            SlidingWindowLimiter::new(SlidingWindowConfig::new(2, Duration::from_millis(50)))
                .unwrap();
        assert!(limiter.try_acquire().unwrap());
        assert!(limiter.try_acquire().unwrap());

        tokio::time::sleep(Duration::from_millis(130)).await;
        assert!(limiter.try_acquire().unwrap());
        assert!(limiter.try_acquire().unwrap());
    }

    #[tokio::test]
    async fn blocking_acquire_admits_once_weight_decays() {
        let limiter = std::sync::Arc::new(
            SlidingWindowLimiter::new(
                SlidingWindowConfig::new(1, Duration::from_millis(80))
                    .with_poll_interval(Duration::from_millis(10)),
            )
            .unwrap(),
        );
        assert!(limiter.try_acquire().unwrap());

        let start = std::time::Instant::now();
        limiter.acquire(Some(Duration::from_millis(500))).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(limiter.stats().unwrap().permits_acquired, 2);
    }

    #[tokio::test]
    async fn deadline_expiry_hints_next_slot() {
        let limiter =
            SlidingWindowLimiter::new(SlidingWindowConfig::new(1, Duration::from_secs(600)))
                .unwrap();
        assert!(limiter.try_acquire().unwrap());

        let err = limiter.acquire(Some(Duration::from_millis(30))).await.unwrap_err();
        assert!(err.is_exceeded());
        assert_eq!(err.algorithm(), Some("SlidingWindow"));
        assert!(err.retry_after().unwrap() <= Duration::from_secs(600));
        assert_eq!(limiter.stats().unwrap().permits_rejected, 1);
    }

    #[tokio::test]
    async fn zero_timeout_fails_fast() {
        let limiter =
            SlidingWindowLimiter::new(SlidingWindowConfig::new(1, Duration::from_secs(600)))
                .unwrap();
        limiter.acquire(Some(Duration::ZERO)).await.unwrap();
        let err = limiter.acquire(Some(Duration::ZERO)).await.unwrap_err();
        assert!(err.is_exceeded());
    }

    #[tokio::test]
    async fn shutdown_rejects_everything() {
        let limiter =
            SlidingWindowLimiter::new(SlidingWindowConfig::new(1, Duration::from_secs(1)))
                .unwrap();
        limiter.shutdown();
        limiter.shutdown();
        assert_eq!(limiter.try_acquire(), Err(LimitError::Disposed));
        assert_eq!(limiter.acquire(None).await, Err(LimitError::Disposed));
        assert!(limiter.stats().is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(SlidingWindowConfig::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(SlidingWindowConfig::new(1, Duration::ZERO).validate().is_err());
        assert!(SlidingWindowConfig::new(1, Duration::from_secs(1))
            .with_poll_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn default_poll_interval_applied() {
        let config = SlidingWindowConfig::new(1, Duration::from_secs(1));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }
}
