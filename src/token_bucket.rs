//! Token bucket limiter
//!
//! A bucket holds up to `capacity` tokens; a background task deposits
//! `refill_amount` tokens every `refill_interval` and then drains the FIFO
//! waiter queue while tokens remain. Admission consumes one token. Bursts
//! up to `capacity` are allowed; the sustained rate is
//! `refill_amount / refill_interval`.

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

const ALGORITHM: &str = "TokenBucket";

/// Configuration for [`TokenBucketLimiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    /// Maximum tokens the bucket can hold (burst limit).
    pub capacity: u64,
    /// Tokens deposited per refill tick.
    pub refill_amount: u64,
    /// Interval between refill ticks.
    pub refill_interval: Duration,
    /// Tokens present at creation, clamped to `[0, capacity]`.
    /// Defaults to a full bucket.
    pub initial_tokens: Option<u64>,
}

impl TokenBucketConfig {
    /// Create a configuration with a full initial bucket.
    pub fn new(capacity: u64, refill_amount: u64, refill_interval: Duration) -> Self {
        Self { capacity, refill_amount, refill_interval, initial_tokens: None }
    }

    /// Override the initial token count (clamped to `[0, capacity]`).
    pub fn with_initial_tokens(mut self, tokens: u64) -> Self {
        self.initial_tokens = Some(tokens);
        self
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCount("capacity"));
        }
        if self.refill_amount == 0 {
            return Err(ConfigError::ZeroCount("refill_amount"));
        }
        if self.refill_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("refill_interval"));
        }
        Ok(())
    }
}

struct BucketState {
    tokens: u64,
    queue: VecDeque<Waiter>,
    acquired: u64,
    rejected: u64,
    next_waiter_id: u64,
    disposed: bool,
}

/// Token bucket limiter with a FIFO blocking queue.
pub struct TokenBucketLimiter {
    state: Arc<Mutex<BucketState>>,
    capacity: u64,
    refill_interval: Duration,
    refill_task: tokio::task::JoinHandle<()>,
}

impl TokenBucketLimiter {
    /// Create a limiter and start its refill task.
    ///
    /// Must be called within a tokio runtime. Fails if any parameter
    /// violates its constraint.
    pub fn new(config: TokenBucketConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let initial = config.initial_tokens.unwrap_or(config.capacity).min(config.capacity);
        let state = Arc::new(Mutex::new(BucketState {
            tokens: initial,
            queue: VecDeque::new(),
            acquired: 0,
            rejected: 0,
            next_waiter_id: 0,
            disposed: false,
        }));
        let refill_task = spawn_refill(
            Arc::downgrade(&state),
            config.refill_amount,
            config.capacity,
            config.refill_interval,
        );
        Ok(Self {
            state,
            capacity: config.capacity,
            refill_interval: config.refill_interval,
            refill_task,
        })
    }

    fn try_acquire_locked(s: &mut BucketState) -> bool {
        // Waiters already committed to the queue go first; a stream of
        // non-blocking arrivals must not starve them.
        if s.queue.is_empty() && s.tokens > 0 {
            s.tokens -= 1;
            s.acquired += 1;
            true
        } else {
            s.rejected += 1;
            debug!(tokens = s.tokens, queued = s.queue.len(), "token bucket rejected request");
            false
        }
    }
}

fn spawn_refill(
    state: Weak<Mutex<BucketState>>,
    refill_amount: u64,
    capacity: u64,
    refill_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refill_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so deposits start
        // one full interval after creation.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else { break };
            let mut s = state.lock().unwrap();
            if s.disposed {
                break;
            }
            s.tokens = s.tokens.saturating_add(refill_amount).min(capacity);
            while s.tokens > 0 {
                let Some(waiter) = s.queue.pop_front() else { break };
                if waiter.grant() {
                    s.tokens -= 1;
                    s.acquired += 1;
                    trace!(tokens = s.tokens, "granted refilled token to queued waiter");
                } else {
                    // Deadline fired or caller went away; the token stays.
                    trace!("discarding dead token bucket waiter");
                }
            }
        }
    })
}

#[async_trait]
impl Limiter for TokenBucketLimiter {
    fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    fn try_acquire(&self) -> Result<bool, LimitError> {
        let mut s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        Ok(Self::try_acquire_locked(&mut s))
    }

    async fn acquire(&self, timeout: Option<Duration>) -> Result<(), LimitError> {
        let fail_fast = matches!(timeout, Some(t) if t.is_zero());
        let (id, mut rx) = {
            let mut s = self.state.lock().unwrap();
            if s.disposed {
                return Err(LimitError::Disposed);
            }
            if s.queue.is_empty() && s.tokens > 0 {
                s.tokens -= 1;
                s.acquired += 1;
                return Ok(());
            }
            if fail_fast {
                s.rejected += 1;
                debug!("token bucket rejected fail-fast acquire");
                return Err(LimitError::deadline(ALGORITHM, Some(self.refill_interval)));
            }
            let id = s.next_waiter_id;
            s.next_waiter_id += 1;
            let (waiter, rx) = Waiter::new(id);
            s.queue.push_back(waiter);
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
                let removed = {
                    let mut s = self.state.lock().unwrap();
                    match s.queue.iter().position(|w| w.id == id) {
                        Some(pos) => {
                            s.queue.remove(pos);
                            s.rejected += 1;
                            debug!("token bucket waiter timed out");
                            true
                        }
                        None => false,
                    }
                };
                if removed {
                    Err(LimitError::deadline(ALGORITHM, Some(self.refill_interval)))
                } else {
                    // A grant (or disposal) won the race; honor it.
                    match rx.await {
                        Ok(result) => result,
                        Err(_) => Err(LimitError::Disposed),
                    }
                }
            }
        }
    }

    fn stats(&self) -> Result<LimiterStats, LimitError> {
        let s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        Ok(LimiterStats {
            permits_acquired: s.acquired,
            permits_rejected: s.rejected,
            current_permits: s.tokens,
            max_permits: self.capacity,
            queue_depth: s.queue.len(),
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
        self.refill_task.abort();
        let waiters = {
            let mut s = self.state.lock().unwrap();
            if s.disposed {
                return;
            }
            s.disposed = true;
            s.queue.drain(..).collect::<Vec<_>>()
        };
        debug!(waiters = waiters.len(), "token bucket shut down");
        for waiter in waiters {
            waiter.fail(LimitError::Disposed);
        }
    }
}

impl Drop for TokenBucketLimiter {
    fn drop(&mut self) {
        self.refill_task.abort();
    }
}
