#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Floodgate
//!
//! Asynchronous admission control for tokio services: six rate-limiting
//! state machines behind one [`Limiter`] contract, a per-key pool that
//! partitions admission by caller identity, and the supporting pieces a
//! rate-limited client or server needs (key extraction, response-header
//! parsing).
//!
//! ## Algorithms
//!
//! | Limiter | Shape | Queueing |
//! |---------|-------|----------|
//! | [`TokenBucketLimiter`] | burst up to capacity, steady refill | FIFO waiters |
//! | [`FixedWindowLimiter`] | counter reset per window | polling |
//! | [`SlidingWindowLimiter`] | two-slot weighted estimate, O(1) | polling |
//! | [`SlidingLogLimiter`] | exact timestamp log, O(max) | polling |
//! | [`LeakyBucketLimiter`] | constant output rate | FIFO slots |
//! | [`ConcurrencyLimiter`] | semaphore with explicit release | FIFO waiters |
//!
//! Every limiter offers non-blocking [`Limiter::try_acquire`], blocking
//! [`Limiter::acquire`] with an optional timeout, a linearizable
//! [`Limiter::stats`] snapshot, and idempotent [`Limiter::shutdown`] that
//! fails in-flight waiters.
//!
//! ## Quick start
//!
//! ```rust
//! use floodgate::{Limiter, TokenBucketConfig, TokenBucketLimiter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), floodgate::LimitError> {
//!     let limiter = TokenBucketLimiter::new(TokenBucketConfig::new(
//!         100,                         // burst capacity
//!         10,                          // tokens per refill
//!         Duration::from_millis(100),  // refill cadence
//!     ))
//!     .expect("valid config");
//!
//!     if limiter.try_acquire()? {
//!         // handle the request
//!     }
//!
//!     // Or wait (up to a deadline) for a token:
//!     limiter.acquire(Some(Duration::from_secs(1))).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Per-key pooling
//!
//! ```rust
//! use floodgate::keyed::KeyedLimiter;
//! use floodgate::{FixedWindowConfig, FixedWindowLimiter, Limiter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = KeyedLimiter::builder(|| {
//!     Arc::new(
//!         FixedWindowLimiter::new(FixedWindowConfig::new(60, Duration::from_secs(60)))
//!             .expect("valid config"),
//!     ) as Arc<dyn Limiter>
//! })
//! .on_rejected(|key, err| eprintln!("{key} throttled: {err}"))
//! .build();
//!
//! assert!(pool.try_admit("203.0.113.7").unwrap());
//! # }
//! ```

pub mod concurrency;
pub mod error;
pub mod extract;
pub mod fixed_window;
pub mod headers;
pub mod keyed;
pub mod leaky_bucket;
pub mod limiter;
pub mod prelude;
pub mod sliding_log;
pub mod sliding_window;
pub mod token_bucket;

mod waiter;

// Re-exports
pub use concurrency::{ConcurrencyConfig, ConcurrencyLimiter};
pub use error::{ConfigError, LimitError};
pub use fixed_window::{FixedWindowConfig, FixedWindowLimiter};
pub use headers::RateLimitHeaders;
pub use leaky_bucket::{LeakyBucketConfig, LeakyBucketLimiter};
pub use limiter::{Limiter, LimiterStats};
pub use sliding_log::{SlidingLogConfig, SlidingLogLimiter};
pub use sliding_window::{SlidingWindowConfig, SlidingWindowLimiter};
pub use token_bucket::{TokenBucketConfig, TokenBucketLimiter};
