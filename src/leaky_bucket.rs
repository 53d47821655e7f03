//! Leaky bucket limiter
//!
//! The bucket is a bounded FIFO queue drained at a constant rate: one slot
//! leaks per `leak_interval`, so downstream sees at most one admission per
//! tick no matter how bursty arrivals are. Arrivals beyond `capacity` are
//! rejected immediately rather than queued.

use crate::limiter::{Limiter, LimiterStats};
use crate::waiter::Waiter;
use crate::{ConfigError, LimitError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

const ALGORITHM: &str = "LeakyBucket";

/// Configuration for [`LeakyBucketLimiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakyBucketConfig {
    /// Maximum queued slots.
    pub capacity: u64,
    /// Interval between leaks; the bucket's output period.
    pub leak_interval: Duration,
}

impl LeakyBucketConfig {
    /// Create a configuration.
    pub fn new(capacity: u64, leak_interval: Duration) -> Self {
        Self { capacity, leak_interval }
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCount("capacity"));
        }
        if self.leak_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("leak_interval"));
        }
        Ok(())
    }
}

enum Slot {
    /// Admitted through `try_acquire`: counted at admission, leaks silently.
    Filled,
    /// A suspended `acquire` caller, resolved when its slot leaks.
    Waiting(Waiter),
}

struct LeakState {
    queue: VecDeque<Slot>,
    acquired: u64,
    rejected: u64,
    next_waiter_id: u64,
    disposed: bool,
}

/// Leaky bucket limiter with periodic drain and immediate-overflow
/// rejection.
pub struct LeakyBucketLimiter {
    state: Arc<Mutex<LeakState>>,
    capacity: u64,
    leak_interval: Duration,
    leak_task: tokio::task::JoinHandle<()>,
}

impl LeakyBucketLimiter {
    /// Create a limiter and start its leak task.
    ///
    /// Must be called within a tokio runtime. Fails if any parameter
    /// violates its constraint.
    pub fn new(config: LeakyBucketConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = Arc::new(Mutex::new(LeakState {
            queue: VecDeque::new(),
            acquired: 0,
            rejected: 0,
            next_waiter_id: 0,
            disposed: false,
        }));
        let leak_task = spawn_leak(Arc::downgrade(&state), config.leak_interval);
        Ok(Self {
            state,
            capacity: config.capacity,
            leak_interval: config.leak_interval,
            leak_task,
        })
    }

    fn overflow(&self) -> LimitError {
        LimitError::Exceeded {
            algorithm: ALGORITHM,
            message: "bucket is at capacity".to_string(),
            retry_after: Some(self.leak_interval),
        }
    }
}

fn spawn_leak(state: Weak<Mutex<LeakState>>, leak_interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(leak_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else { break };
            let mut s = state.lock().unwrap();
            if s.disposed {
                break;
            }
            match s.queue.pop_front() {
                Some(Slot::Filled) | None => {}
                Some(Slot::Waiting(waiter)) => {
                    if waiter.grant() {
                        s.acquired += 1;
                        trace!(queued = s.queue.len(), "leaked slot to queued waiter");
                    }
                }
            }
        }
    })
}

#[async_trait]
impl Limiter for LeakyBucketLimiter {
    fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    fn try_acquire(&self) -> Result<bool, LimitError> {
        let mut s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        if (s.queue.len() as u64) < self.capacity {
            s.queue.push_back(Slot::Filled);
            s.acquired += 1;
            Ok(true)
        } else {
            s.rejected += 1;
            debug!("leaky bucket rejected request");
            Ok(false)
        }
    }

    async fn acquire(&self, timeout: Option<Duration>) -> Result<(), LimitError> {
        let fail_fast = matches!(timeout, Some(t) if t.is_zero());
        let (id, mut rx) = {
            let mut s = self.state.lock().unwrap();
            if s.disposed {
                return Err(LimitError::Disposed);
            }
            if (s.queue.len() as u64) >= self.capacity {
                s.rejected += 1;
                debug!("leaky bucket rejected acquire at capacity");
                return Err(self.overflow());
            }
            if fail_fast {
                // One admission attempt: take a slot like `try_acquire`.
                s.queue.push_back(Slot::Filled);
                s.acquired += 1;
                return Ok(());
            }
            let id = s.next_waiter_id;
            s.next_waiter_id += 1;
            let (waiter, rx) = Waiter::new(id);
            s.queue.push_back(Slot::Waiting(waiter));
            (id, rx)
        };

        let Some(timeout) = timeout else {
            return match rx.await {
                Ok(result) => result,
                Err(_) => Err(LimitError::Disposed),
            };
        };

        let deadline = tokio::time::Instant::now() + timeout;
        tokio::select! {
            result = &mut rx => match result {
                Ok(result) => result,
                Err(_) => Err(LimitError::Disposed),
            },
            _ = tokio::time::sleep_until(deadline) => {
                let position = {
                    let mut s = self.state.lock().unwrap();
                    let found = s.queue.iter().position(
                        |slot| matches!(slot, Slot::Waiting(w) if w.id == id),
                    );
                    if let Some(pos) = found {
                        s.queue.remove(pos);
                        s.rejected += 1;
                        debug!("leaky bucket waiter timed out");
                    }
                    found
                };
                match position {
                    Some(pos) => Err(LimitError::deadline(
                        ALGORITHM,
                        Some(self.leak_interval.saturating_mul(pos as u32 + 1)),
                    )),
                    // The leak (or disposal) won the race; honor it.
                    None => match rx.await {
                        Ok(result) => result,
                        Err(_) => Err(LimitError::Disposed),
                    },
                }
            }
        }
    }

    fn stats(&self) -> Result<LimiterStats, LimitError> {
        let s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        let pending =
            s.queue.iter().filter(|slot| matches!(slot, Slot::Waiting(_))).count();
        Ok(LimiterStats {
            permits_acquired: s.acquired,
            permits_rejected: s.rejected,
            current_permits: self.capacity - s.queue.len() as u64,
            max_permits: self.capacity,
            queue_depth: pending,
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
        self.leak_task.abort();
        let drained = {
            let mut s = self.state.lock().unwrap();
            if s.disposed {
                return;
            }
            s.disposed = true;
            s.queue.drain(..).collect::<Vec<_>>()
        };
        debug!(slots = drained.len(), "leaky bucket shut down");
        for slot in drained {
            if let Slot::Waiting(waiter) = slot {
                waiter.fail(LimitError::Disposed);
            }
        }
    }
}

impl Drop for LeakyBucketLimiter {
    fn drop(&mut self) {
        self.leak_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn try_acquire_burst_capped_at_capacity() {
        let limiter =
            LeakyBucketLimiter::new(LeakyBucketConfig::new(3, Duration::from_secs(600))).unwrap();
        for _ in 0..3 {
            assert!(limiter.try_acquire().unwrap());
        }
        assert!(!limiter.try_acquire().unwrap());

        let stats = limiter.stats().unwrap();
        assert_eq!(stats.permits_acquired, 3);
        assert_eq!(stats.permits_rejected, 1);
        assert_eq!(stats.current_permits, 0);
        assert_eq!(stats.queue_depth, 0, "filled slots are not suspended callers");
    }

    #[tokio::test]
    async fn blocking_acquire_resolves_on_leak_tick() {
        let limiter =
            LeakyBucketLimiter::new(LeakyBucketConfig::new(3, Duration::from_millis(50))).unwrap();

        let start = std::time::Instant::now();
        limiter.acquire(None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(25));
        assert_eq!(limiter.stats().unwrap().permits_acquired, 1);
    }

    #[tokio::test]
    async fn filled_slots_leak_before_waiters() {
        let limiter = Arc::new(
            LeakyBucketLimiter::new(LeakyBucketConfig::new(3, Duration::from_millis(40))).unwrap(),
        );
        assert!(limiter.try_acquire().unwrap());

        let start = std::time::Instant::now();
        limiter.acquire(None).await.unwrap();
        // First tick drains the filled slot, second grants the waiter.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn overflow_rejects_blocking_acquire_immediately() {
        let limiter =
            LeakyBucketLimiter::new(LeakyBucketConfig::new(2, Duration::from_secs(600))).unwrap();
        assert!(limiter.try_acquire().unwrap());
        assert!(limiter.try_acquire().unwrap());

        let start = std::time::Instant::now();
        let err = limiter.acquire(None).await.unwrap_err();
        assert!(start.elapsed() < Duration::from_millis(50), "must not wait");
        assert!(err.is_exceeded());
        assert_eq!(err.algorithm(), Some("LeakyBucket"));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(600)));
        assert_eq!(limiter.stats().unwrap().permits_rejected, 1);
    }

    #[tokio::test]
    async fn deadline_hint_scales_with_queue_position() {
        let limiter = Arc::new(
            LeakyBucketLimiter::new(LeakyBucketConfig::new(3, Duration::from_secs(10))).unwrap(),
        );
        assert!(limiter.try_acquire().unwrap());
        assert!(limiter.try_acquire().unwrap());

        // Third slot in line: two filled slots leak first.
        let err = limiter.acquire(Some(Duration::from_millis(30))).await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(limiter.stats().unwrap().queue_depth, 0);
    }

    #[tokio::test]
    async fn zero_timeout_takes_a_slot_or_fails_fast() {
        let limiter =
            LeakyBucketLimiter::new(LeakyBucketConfig::new(1, Duration::from_secs(600))).unwrap();
        limiter.acquire(Some(Duration::ZERO)).await.unwrap();
        let err = limiter.acquire(Some(Duration::ZERO)).await.unwrap_err();
        assert!(err.is_exceeded());
    }

    #[tokio::test]
    async fn shutdown_fails_pending_waiters() {
        let limiter = Arc::new(
            LeakyBucketLimiter::new(LeakyBucketConfig::new(2, Duration::from_secs(600))).unwrap(),
        );
        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire(None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        limiter.shutdown();
        assert_eq!(waiter.await.unwrap(), Err(LimitError::Disposed));
        assert_eq!(limiter.try_acquire(), Err(LimitError::Disposed));
        limiter.shutdown();
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(LeakyBucketConfig::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(LeakyBucketConfig::new(1, Duration::ZERO).validate().is_err());
    }
}
