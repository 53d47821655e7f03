//! Fixed window limiter
//!
//! A counter of `max_permits` resets at every `window_duration` boundary.
//! Cheap and predictable, but capacity resets abruptly: a caller that
//! drains one window's budget right before the boundary and the next
//! window's budget right after it can see up to `2 × max_permits` within a
//! single window-length span. Callers needing smooth admission should use
//! [`crate::sliding_window`] or [`crate::sliding_log`] instead.

use crate::limiter::{Limiter, LimiterStats};
use crate::{ConfigError, LimitError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const ALGORITHM: &str = "FixedWindow";

/// Configuration for [`FixedWindowLimiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWindowConfig {
    /// Admissions allowed per window.
    pub max_permits: u64,
    /// Window length.
    pub window_duration: Duration,
}

impl FixedWindowConfig {
    /// Create a configuration.
    pub fn new(max_permits: u64, window_duration: Duration) -> Self {
        Self { max_permits, window_duration }
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_permits == 0 {
            return Err(ConfigError::ZeroCount("max_permits"));
        }
        if self.window_duration.is_zero() {
            return Err(ConfigError::ZeroDuration("window_duration"));
        }
        Ok(())
    }
}

struct WindowState {
    remaining: u64,
    window_end: Instant,
    acquired: u64,
    rejected: u64,
    disposed: bool,
}

/// Fixed window limiter. No waiter queue: concurrent blocking callers race
/// on the window reset and are admitted in arrival order into the first
/// advance after it, with no guarantee beyond that.
pub struct FixedWindowLimiter {
    state: Mutex<WindowState>,
    max_permits: u64,
    window: Duration,
}

impl FixedWindowLimiter {
    /// Create a limiter. Fails if any parameter violates its constraint.
    pub fn new(config: FixedWindowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(WindowState {
                remaining: config.max_permits,
                window_end: Instant::now() + config.window_duration,
                acquired: 0,
                rejected: 0,
                disposed: false,
            }),
            max_permits: config.max_permits,
            window: config.window_duration,
        })
    }

    /// Roll the window forward past `now`, resetting the budget. Stepping
    /// by whole windows keeps boundaries phase-aligned across idle gaps
    /// without accumulating phantom capacity.
    fn advance(&self, s: &mut WindowState) {
        let now = Instant::now();
        if now >= s.window_end {
            let behind = now.duration_since(s.window_end);
            let steps = (behind.as_nanos() / self.window.as_nanos()) as u64 + 1;
            s.window_end += mul_duration(self.window, steps);
            s.remaining = self.max_permits;
        }
    }
}

fn mul_duration(d: Duration, times: u64) -> Duration {
    Duration::from_nanos((d.as_nanos() as u64).saturating_mul(times))
}

#[async_trait]
impl Limiter for FixedWindowLimiter {
    fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    fn try_acquire(&self) -> Result<bool, LimitError> {
        let mut s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        self.advance(&mut s);
        if s.remaining > 0 {
            s.remaining -= 1;
            s.acquired += 1;
            Ok(true)
        } else {
            s.rejected += 1;
            debug!("fixed window rejected request");
            Ok(false)
        }
    }

    async fn acquire(&self, timeout: Option<Duration>) -> Result<(), LimitError> {
        let fail_fast = matches!(timeout, Some(t) if t.is_zero());
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let window_end = {
                let mut s = self.state.lock().unwrap();
                if s.disposed {
                    return Err(LimitError::Disposed);
                }
                self.advance(&mut s);
                if s.remaining > 0 {
                    s.remaining -= 1;
                    s.acquired += 1;
                    return Ok(());
                }
                s.window_end
            };

            let now = Instant::now();
            let expired = fail_fast || matches!(deadline, Some(d) if now >= d);
            if expired {
                let mut s = self.state.lock().unwrap();
                if s.disposed {
                    return Err(LimitError::Disposed);
                }
                s.rejected += 1;
                debug!("fixed window acquire timed out");
                return Err(LimitError::deadline(
                    ALGORITHM,
                    Some(s.window_end.duration_since(now)),
                ));
            }

            let mut wake = window_end;
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
        Ok(LimiterStats {
            permits_acquired: s.acquired,
            permits_rejected: s.rejected,
            current_permits: s.remaining,
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
        debug!("fixed window limiter shut down");
    }
}
