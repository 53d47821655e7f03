//! Concurrency limiter
//!
//! A semaphore-style limiter: at most `max_concurrency` permits are out at
//! once, and each must be returned with [`Limiter::release`]. Callers that
//! find every slot taken queue FIFO and are dispatched one at a time as
//! releases come in.

use crate::limiter::{Limiter, LimiterStats};
use crate::waiter::Waiter;
use crate::{ConfigError, LimitError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, trace};

const ALGORITHM: &str = "Concurrency";

/// Configuration for [`ConcurrencyLimiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Maximum permits out at once.
    pub max_concurrency: u64,
}

impl ConcurrencyConfig {
    /// Create a configuration.
    pub fn new(max_concurrency: u64) -> Self {
        Self { max_concurrency }
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroCount("max_concurrency"));
        }
        Ok(())
    }
}

struct ConcurrencyState {
    in_flight: u64,
    queue: VecDeque<Waiter>,
    acquired: u64,
    rejected: u64,
    next_waiter_id: u64,
    disposed: bool,
}

/// Concurrency limiter with explicit release and FIFO dispatch.
pub struct ConcurrencyLimiter {
    state: Mutex<ConcurrencyState>,
    max_concurrency: u64,
}

impl ConcurrencyLimiter {
    /// Create a limiter. Fails if `max_concurrency` is zero.
    pub fn new(config: ConcurrencyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(ConcurrencyState {
                in_flight: 0,
                queue: VecDeque::new(),
                acquired: 0,
                rejected: 0,
                next_waiter_id: 0,
                disposed: false,
            }),
            max_concurrency: config.max_concurrency,
        })
    }

    /// Hand a freed slot to the next waiter still listening.
    fn dispatch_next(&self, s: &mut ConcurrencyState) {
        while s.in_flight < self.max_concurrency {
            let Some(waiter) = s.queue.pop_front() else { break };
            if waiter.grant() {
                s.in_flight += 1;
                s.acquired += 1;
                trace!(in_flight = s.in_flight, "dispatched freed slot to queued waiter");
                break;
            }
            // Timed out between dispatches; try the next in line.
        }
    }
}

#[async_trait]
impl Limiter for ConcurrencyLimiter {
    fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    fn try_acquire(&self) -> Result<bool, LimitError> {
        let mut s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        if s.in_flight < self.max_concurrency {
            s.in_flight += 1;
            s.acquired += 1;
            Ok(true)
        } else {
            s.rejected += 1;
            debug!(in_flight = s.in_flight, "concurrency limit rejected request");
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
            if s.in_flight < self.max_concurrency {
                s.in_flight += 1;
                s.acquired += 1;
                return Ok(());
            }
            if fail_fast {
                s.rejected += 1;
                debug!("concurrency limit rejected fail-fast acquire");
                return Err(LimitError::deadline(ALGORITHM, None));
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
                            debug!("concurrency waiter timed out");
                            true
                        }
                        None => false,
                    }
                };
                if removed {
                    // No retry-after: slots free only when callers release.
                    Err(LimitError::deadline(ALGORITHM, None))
                } else {
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
            current_permits: self.max_concurrency - s.in_flight,
            max_permits: self.max_concurrency,
            queue_depth: s.queue.len(),
        })
    }

    fn release(&self) -> Result<(), LimitError> {
        let mut s = self.state.lock().unwrap();
        if s.disposed {
            return Err(LimitError::Disposed);
        }
        if s.in_flight == 0 {
            // Tolerated, but a stray release usually means a missing
            // acquire somewhere in the caller.
            debug!("release called with no permits in flight");
            return Ok(());
        }
        s.in_flight -= 1;
        self.dispatch_next(&mut s);
        Ok(())
    }

    fn shutdown(&self) {
        let waiters = {
            let mut s = self.state.lock().unwrap();
            if s.disposed {
                return;
            }
            s.disposed = true;
            s.in_flight = 0;
            s.queue.drain(..).collect::<Vec<_>>()
        };
        debug!(waiters = waiters.len(), "concurrency limiter shut down");
        for waiter in waiters {
            waiter.fail(LimitError::Disposed);
        }
    }
}
