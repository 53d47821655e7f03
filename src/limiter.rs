//! Core limiter contract and statistics snapshot.
//!
//! Every admission algorithm in this crate implements [`Limiter`]:
//! - [`Limiter::try_acquire`]: non-blocking admission attempt, never waits.
//! - [`Limiter::acquire`]: suspending admission attempt bounded by an
//!   optional timeout.
//! - [`Limiter::release`]: signal that a granted permit's work is done
//!   (meaningful only for the concurrency limiter; a no-op elsewhere).
//! - [`Limiter::shutdown`]: idempotent teardown that fails in-flight
//!   waiters and rejects all subsequent operations.
//!
//! The trait is object-safe so limiters can be stored behind
//! `Arc<dyn Limiter>` by the per-key pool.

use crate::LimitError;
use async_trait::async_trait;
use std::time::Duration;

/// Point-in-time snapshot of a limiter's counters and capacity.
///
/// Snapshots are values: once produced they never change, and callers must
/// not cache them across operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimiterStats {
    /// Cumulative successful admissions.
    pub permits_acquired: u64,
    /// Cumulative rejections: `try_acquire` returning false, non-blocking
    /// refusal, or deadline expiry.
    pub permits_rejected: u64,
    /// Capacity available right now. Algorithm-specific: tokens, remaining
    /// window budget, spare queue capacity, or free concurrency slots.
    pub current_permits: u64,
    /// Upper bound for `current_permits`.
    pub max_permits: u64,
    /// Callers currently suspended in `acquire`. Zero for algorithms
    /// without a waiter queue.
    pub queue_depth: usize,
}

/// Common contract for all admission-control algorithms.
#[async_trait]
pub trait Limiter: Send + Sync {
    /// Tag naming the algorithm, carried by [`LimitError::Exceeded`].
    fn algorithm(&self) -> &'static str;

    /// Non-blocking admission attempt.
    ///
    /// `Ok(true)` means one permit was consumed. `Ok(false)` means the
    /// request was rejected and counted as such. Never suspends.
    fn try_acquire(&self) -> Result<bool, LimitError>;

    /// Suspending admission attempt.
    ///
    /// With `timeout: None` the caller waits indefinitely. A zero timeout
    /// behaves like [`Limiter::try_acquire`] on the asynchronous path: one
    /// attempt, then an immediate [`LimitError::Exceeded`]. When the
    /// timeout elapses before a grant, the waiter is removed from the queue
    /// and the error carries the algorithm's retry-after estimate.
    /// Deadlines are absolute internally, so polling algorithms do not
    /// drift across retries.
    async fn acquire(&self, timeout: Option<Duration>) -> Result<(), LimitError>;

    /// Produce a fresh [`LimiterStats`] snapshot.
    fn stats(&self) -> Result<LimiterStats, LimitError>;

    /// Acknowledge that one previously granted permit has been consumed.
    ///
    /// Counter- and window-based algorithms account at admission time, so
    /// their `release` does nothing beyond the disposed check. The
    /// concurrency limiter frees a slot and dispatches the next waiter.
    fn release(&self) -> Result<(), LimitError>;

    /// Idempotent teardown: cancels internal timers, fails every queued
    /// waiter with [`LimitError::Disposed`], and makes every subsequent
    /// operation return [`LimitError::Disposed`].
    fn shutdown(&self);
}

impl std::fmt::Debug for dyn Limiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("dyn Limiter").field(&self.algorithm()).finish()
    }
}
