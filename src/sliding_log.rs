//! Sliding window log limiter (exact)
//!
//! Keeps the timestamp of every admission inside the window in a FIFO log.
//! At every decision the head entries older than the window are evicted;
//! admission requires the log to hold fewer than `max_permits` entries, so
//! the count over `(now − window, now]` is exact and there is no
//! boundary-burst artifact. Memory is O(`max_permits`) — prefer
//! [`crate::sliding_window`] for large limits.

use crate::limiter::{Limiter, LimiterStats};
use crate::{ConfigError, LimitError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const ALGORITHM: &str = "SlidingWindowLog";

/// Configuration for [`SlidingLogLimiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingLogConfig {
    /// Admissions allowed per sliding window.
    pub max_permits: u64,
    /// Window length.
    pub window_duration: Duration,
    /// How often a blocked `acquire` re-checks the log.
    pub poll_interval: Duration,
}

impl SlidingLogConfig {
    /// Create a configuration with the default poll interval.
    pub fn new(max_permits: u64, window_duration: Duration) -> Self {
        Self {
            max_permits,
            window_duration,
            poll_interval: crate::sliding_window::DEFAULT_POLL_INTERVAL,
        }
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

struct LogState {
    log: VecDeque<Instant>,
    acquired: u64,
    rejected: u64,
    disposed: bool,
}

/// Exact sliding window limiter over an admission-timestamp log.
pub struct SlidingLogLimiter {
    state: Mutex<LogState>,
    max_permits: u64,
    window: Duration,
    poll_interval: Duration,
}

impl SlidingLogLimiter {
    /// Create a limiter. Fails if any parameter violates its constraint.
    pub fn new(config: SlidingLogConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(LogState {
                log: VecDeque::new(),
                acquired: 0,
                rejected: 0,
                disposed: false,
            }),
            max_permits: config.max_permits,
            window: config.window_duration,
            poll_interval: config.poll_interval,
        })
    }

    fn evict(&self, s: &mut LogState) {
        let now = Instant::now();
        while s.log.front().is_some_and(|&t| now.duration_since(t) >= self.window) {
            s.log.pop_front();
        }
    }

    /// Time until the oldest entry leaves the window. Zero when the log is
    /// empty (capacity is available immediately).
    fn oldest_expiry(&self, s: &LogState) -> Duration {
        match s.log.front() {
            Some(&oldest) => {
                self.window.saturating_sub(Instant::now().duration_since(oldest))
            }
            None => Duration::ZERO,
        }
    }
}

#[async_trait]
impl Limiter for SlidingLogLimiter {
    fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    fn try_acquire(&self) -> Result<bool, LimitError> {
        let mut s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        self.evict(&mut s);
        if (s.log.len() as u64) < self.max_permits {
            s.log.push_back(Instant::now());
            s.acquired += 1;
            Ok(true)
        } else {
            s.rejected += 1;
            debug!("sliding log rejected request");
            Ok(false)
        }
    }

    async fn acquire(&self, timeout: Option<Duration>) -> Result<(), LimitError> {
        let fail_fast = matches!(timeout, Some(t) if t.is_zero());
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let oldest_expiry = {
                let mut s = self.state.lock().unwrap();
                if s.disposed {
                    return Err(LimitError::Disposed);
                }
                self.evict(&mut s);
                if (s.log.len() as u64) < self.max_permits {
                    s.log.push_back(Instant::now());
                    s.acquired += 1;
                    return Ok(());
                }
                self.oldest_expiry(&s)
            };

            let now = Instant::now();
            let expired = fail_fast || matches!(deadline, Some(d) if now >= d);
            if expired {
                let mut s = self.state.lock().unwrap();
                if s.disposed {
                    return Err(LimitError::Disposed);
                }
                s.rejected += 1;
                debug!("sliding log acquire timed out");
                return Err(LimitError::deadline(ALGORITHM, Some(self.oldest_expiry(&s))));
            }

            let mut wake = now + oldest_expiry.min(self.poll_interval);
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
        self.evict(&mut s);
        Ok(LimiterStats {
            permits_acquired: s.acquired,
            permits_rejected: s.rejected,
            current_permits: self.max_permits - s.log.len() as u64,
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
        s.log.clear();
        debug!("sliding log limiter shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_boundary_burst() {
        let limiter =
            SlidingLogLimiter::new(SlidingLogConfig::new(3, Duration::from_millis(120))).unwrap();
        for _ in 0..3 {
            assert!(limiter.try_acquire().unwrap());
        }
        assert!(!limiter.try_acquire().unwrap());

        // Oldest admission is still inside the window.
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(!limiter.try_acquire().unwrap());

        // All three have aged out.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.try_acquire().unwrap());
    }

    #[tokio::test]
    async fn window_count_never_exceeds_max() {
        let limiter =
            SlidingLogLimiter::new(SlidingLogConfig::new(5, Duration::from_millis(80))).unwrap();
        let mut admitted = 0u64;
        for _ in 0..20 {
            if limiter.try_acquire().unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
        let stats = limiter.stats().unwrap();
        assert_eq!(stats.current_permits, 0);
        assert_eq!(stats.permits_rejected, 15);
    }

    #[tokio::test]
    async fn blocking_acquire_admits_when_oldest_expires() {
        let limiter =
            SlidingLogLimiter::new(SlidingLogConfig::new(1, Duration::from_millis(60))).unwrap();
        assert!(limiter.try_acquire().unwrap());

        let start = std::time::Instant::now();
        limiter.acquire(Some(Duration::from_millis(500))).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(limiter.stats().unwrap().permits_acquired, 2);
    }

    #[tokio::test]
    async fn deadline_expiry_hints_oldest_expiry() {
        let limiter =
            SlidingLogLimiter::new(SlidingLogConfig::new(1, Duration::from_secs(600))).unwrap();
        assert!(limiter.try_acquire().unwrap());

        let err = limiter.acquire(Some(Duration::from_millis(30))).await.unwrap_err();
        assert!(err.is_exceeded());
        assert_eq!(err.algorithm(), Some("SlidingWindowLog"));
        assert!(err.retry_after().unwrap() <= Duration::from_secs(600));
        assert_eq!(limiter.stats().unwrap().permits_rejected, 1);
    }

    #[tokio::test]
    async fn zero_timeout_fails_fast() {
        let limiter =
            SlidingLogLimiter::new(SlidingLogConfig::new(1, Duration::from_secs(600))).unwrap();
        limiter.acquire(Some(Duration::ZERO)).await.unwrap();
        let err = limiter.acquire(Some(Duration::ZERO)).await.unwrap_err();
        assert!(err.is_exceeded());
        assert_eq!(limiter.stats().unwrap().permits_rejected, 1);
    }

    #[tokio::test]
    async fn shutdown_rejects_everything() {
        let limiter =
            SlidingLogLimiter::new(SlidingLogConfig::new(2, Duration::from_secs(1))).unwrap();
        limiter.try_acquire().unwrap();
        limiter.shutdown();
        limiter.shutdown();
        assert_eq!(limiter.try_acquire(), Err(LimitError::Disposed));
        assert_eq!(limiter.acquire(None).await, Err(LimitError::Disposed));
        assert!(limiter.stats().is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(SlidingLogConfig::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(SlidingLogConfig::new(1, Duration::ZERO).validate().is_err());
        assert!(SlidingLogConfig::new(1, Duration::from_secs(1))
            .with_poll_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
