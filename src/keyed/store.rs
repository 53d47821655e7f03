//! Pluggable key-to-limiter storage.
//!
//! The store is the extension seam for alternative backends; the bundled
//! [`InMemoryLimiterStore`] keeps everything in a mutex-guarded map. The
//! store owns every limiter it holds: removal in any form shuts the
//! limiter down.

use crate::limiter::Limiter;
use crate::LimitError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Factory producing a fresh limiter for a key's first access.
pub type LimiterFactory = dyn Fn() -> Arc<dyn Limiter> + Send + Sync;

/// Mapping from key to owned limiter with bulk eviction.
pub trait LimiterStore: Send + Sync {
    /// Return the limiter bound to `key`, creating it via `factory` on
    /// first access.
    fn get_or_create(
        &self,
        key: &str,
        factory: &LimiterFactory,
    ) -> Result<Arc<dyn Limiter>, LimitError>;

    /// Remove and shut down the limiter bound to `key`. Idempotent.
    fn remove(&self, key: &str);

    /// Remove and shut down every limiter the predicate matches.
    ///
    /// The predicate runs with the store locked and must not call back
    /// into the store.
    fn remove_where(&self, predicate: &dyn Fn(&str, &dyn Limiter) -> bool);

    /// Shut down every limiter, clear the map, and reject further
    /// `get_or_create` calls with [`LimitError::Disposed`]. Idempotent.
    fn shutdown(&self);
}

#[derive(Default)]
struct StoreInner {
    map: HashMap<String, Arc<dyn Limiter>>,
    disposed: bool,
}

/// In-memory [`LimiterStore`].
#[derive(Default)]
pub struct InMemoryLimiterStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryLimiterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of limiters currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    /// True when no limiters are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LimiterStore for InMemoryLimiterStore {
    fn get_or_create(
        &self,
        key: &str,
        factory: &LimiterFactory,
    ) -> Result<Arc<dyn Limiter>, LimitError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.disposed {
            return Err(LimitError::Disposed);
        }
        let limiter = inner
            .map
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(key, "creating limiter");
                factory()
            })
            .clone();
        Ok(limiter)
    }

    fn remove(&self, key: &str) {
        let removed = self.inner.lock().unwrap().map.remove(key);
        if let Some(limiter) = removed {
            limiter.shutdown();
        }
    }

    fn remove_where(&self, predicate: &dyn Fn(&str, &dyn Limiter) -> bool) {
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            let keys: Vec<String> = inner
                .map
                .iter()
                .filter(|(key, limiter)| predicate(key, limiter.as_ref()))
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter().filter_map(|key| inner.map.remove(&key)).collect::<Vec<_>>()
        };
        for limiter in removed {
            limiter.shutdown();
        }
    }

    fn shutdown(&self) {
        let drained = {
            let mut inner = self.inner.lock().unwrap();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.map.drain().map(|(_, limiter)| limiter).collect::<Vec<_>>()
        };
        debug!(limiters = drained.len(), "limiter store shut down");
        for limiter in drained {
            limiter.shutdown();
        }
    }
}
