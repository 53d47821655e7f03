//! Per-key admission pool.
//!
//! A [`KeyedLimiter`] partitions admission by caller identity: each
//! distinct key lazily gets its own limiter from a factory, and the pool
//! owns every limiter it creates. Keys are arbitrary strings — typically
//! produced by a [`crate::extract::KeyExtractor`].

pub mod store;

use crate::limiter::{Limiter, LimiterStats};
use crate::LimitError;
use std::sync::Arc;
use std::time::Duration;
use store::{InMemoryLimiterStore, LimiterFactory, LimiterStore};
use tracing::debug;

/// Observer invoked with `(key, error)` on every rate-limit rejection,
/// before the error is surfaced to the caller. Must not call back into
/// the pool.
pub type RejectionHook = dyn Fn(&str, &LimitError) + Send + Sync;

/// Per-key pool with non-blocking and blocking admission.
pub struct KeyedLimiter {
    store: Arc<dyn LimiterStore>,
    factory: Arc<LimiterFactory>,
    acquire_timeout: Option<Duration>,
    on_rejected: Option<Arc<RejectionHook>>,
}

impl KeyedLimiter {
    /// Create a pool with the in-memory store, no acquire timeout, and no
    /// rejection hook.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Limiter> + Send + Sync + 'static,
    {
        Self::builder(factory).build()
    }

    /// Start building a pool around a limiter factory.
    pub fn builder<F>(factory: F) -> KeyedLimiterBuilder
    where
        F: Fn() -> Arc<dyn Limiter> + Send + Sync + 'static,
    {
        KeyedLimiterBuilder {
            factory: Arc::new(factory),
            store: None,
            acquire_timeout: None,
            on_rejected: None,
        }
    }

    fn limiter_for(&self, key: &str) -> Result<Arc<dyn Limiter>, LimitError> {
        self.store.get_or_create(key, self.factory.as_ref())
    }

    fn notify_rejected(&self, key: &str, err: &LimitError) {
        if let Some(hook) = &self.on_rejected {
            hook(key, err);
        }
    }

    /// Non-blocking admission for `key`, creating its limiter on first
    /// access. A rejection invokes the hook and returns `Ok(false)`.
    pub fn try_admit(&self, key: &str) -> Result<bool, LimitError> {
        let limiter = self.limiter_for(key)?;
        if limiter.try_acquire()? {
            Ok(true)
        } else {
            let err = LimitError::Exceeded {
                algorithm: limiter.algorithm(),
                message: format!("rate limit exceeded for key \"{}\"", key),
                retry_after: None,
            };
            self.notify_rejected(key, &err);
            Ok(false)
        }
    }

    /// Admission for `key` with the pool's configured timeout.
    ///
    /// A zero configured timeout degrades to the non-blocking path and
    /// surfaces refusal as [`LimitError::Exceeded`]. Rejections invoke the
    /// hook before being returned.
    pub async fn admit(&self, key: &str) -> Result<(), LimitError> {
        let limiter = self.limiter_for(key)?;
        let result = match self.acquire_timeout {
            Some(timeout) if timeout.is_zero() => {
                if limiter.try_acquire()? {
                    Ok(())
                } else {
                    Err(LimitError::Exceeded {
                        algorithm: limiter.algorithm(),
                        message: "non-blocking mode".to_string(),
                        retry_after: None,
                    })
                }
            }
            timeout => limiter.acquire(timeout).await,
        };
        if let Err(err) = &result {
            if err.is_exceeded() {
                self.notify_rejected(key, err);
            }
        }
        result
    }

    /// Release one permit previously granted for `key`. Meaningful only
    /// when the factory produces concurrency limiters.
    pub fn release(&self, key: &str) -> Result<(), LimitError> {
        self.limiter_for(key)?.release()
    }

    /// Snapshot for `key`'s limiter, creating it on first access.
    /// `None` only after the pool has been shut down.
    pub fn stats_for(&self, key: &str) -> Option<LimiterStats> {
        match self.limiter_for(key) {
            Ok(limiter) => limiter.stats().ok(),
            Err(_) => None,
        }
    }

    /// Shut down every limiter in the pool. Idempotent; subsequent
    /// admission calls return [`LimitError::Disposed`].
    pub fn shutdown(&self) {
        debug!("keyed limiter pool shutting down");
        self.store.shutdown();
    }
}

/// Builder for [`KeyedLimiter`].
pub struct KeyedLimiterBuilder {
    factory: Arc<LimiterFactory>,
    store: Option<Arc<dyn LimiterStore>>,
    acquire_timeout: Option<Duration>,
    on_rejected: Option<Arc<RejectionHook>>,
}

impl KeyedLimiterBuilder {
    /// Use a custom storage backend instead of the in-memory default.
    pub fn store(mut self, store: Arc<dyn LimiterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bound every `admit` call. Zero means fail-fast non-blocking
    /// admission; unset means wait indefinitely.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Observe rejections before they are surfaced.
    pub fn on_rejected<H>(mut self, hook: H) -> Self
    where
        H: Fn(&str, &LimitError) + Send + Sync + 'static,
    {
        self.on_rejected = Some(Arc::new(hook));
        self
    }

    /// Finish building the pool.
    pub fn build(self) -> KeyedLimiter {
        KeyedLimiter {
            store: self.store.unwrap_or_else(|| Arc::new(InMemoryLimiterStore::new())),
            factory: self.factory,
            acquire_timeout: self.acquire_timeout,
            on_rejected: self.on_rejected,
        }
    }
}
