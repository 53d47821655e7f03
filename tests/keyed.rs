#[cfg(test)]
mod tests {
    use floodgate::extract::{IpKeyExtractor, KeyExtractor, RouteKeyExtractor};
    use floodgate::keyed::store::{InMemoryLimiterStore, LimiterStore};
    use floodgate::keyed::KeyedLimiter;
    use floodgate::{
        ConcurrencyConfig, ConcurrencyLimiter, FixedWindowConfig, FixedWindowLimiter,
        LimitError, Limiter,
    };
    use http::header::{HeaderMap, HeaderName, HeaderValue};
    use http::Uri;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn per_minute_pool(max_permits: u64) -> KeyedLimiter {
        KeyedLimiter::new(move || {
            Arc::new(
                FixedWindowLimiter::new(FixedWindowConfig::new(
                    max_permits,
                    Duration::from_secs(60),
                ))
                .unwrap(),
            ) as Arc<dyn Limiter>
        })
    }

    #[tokio::test]
    async fn per_key_isolation() {
        let pool = per_minute_pool(1);

        assert!(pool.try_admit("k1").unwrap());
        assert!(!pool.try_admit("k1").unwrap());
        assert!(pool.try_admit("k2").unwrap());

        assert_eq!(pool.stats_for("k1").unwrap().permits_acquired, 1);
        assert_eq!(pool.stats_for("k2").unwrap().permits_acquired, 1);
    }

    #[tokio::test]
    async fn extracted_keys_drive_the_pool() {
        let pool = per_minute_pool(1);
        let extractor = IpKeyExtractor::new();
        let uri: Uri = "/v1/items".parse().unwrap();

        let mut alice = HeaderMap::new();
        alice.insert(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let mut bob = HeaderMap::new();
        bob.insert(
            HeaderName::from_static("x-real-ip"),
            HeaderValue::from_static("198.51.100.2"),
        );

        assert!(pool.try_admit(&extractor.extract(&alice, &uri)).unwrap());
        assert!(!pool.try_admit(&extractor.extract(&alice, &uri)).unwrap());
        assert!(pool.try_admit(&extractor.extract(&bob, &uri)).unwrap());

        // Callers with no identifying headers share the fallback key.
        let anonymous = extractor.extract(&HeaderMap::new(), &uri);
        assert_eq!(anonymous, "unknown");
        assert!(pool.try_admit(&anonymous).unwrap());
        assert!(!pool.try_admit(&anonymous).unwrap());
    }

    #[tokio::test]
    async fn route_keys_partition_by_path() {
        let pool = per_minute_pool(1);
        let extractor = RouteKeyExtractor;
        let headers = HeaderMap::new();

        let items: Uri = "/v1/items".parse().unwrap();
        let orders: Uri = "/v1/orders".parse().unwrap();

        assert!(pool.try_admit(&extractor.extract(&headers, &items)).unwrap());
        assert!(!pool.try_admit(&extractor.extract(&headers, &items)).unwrap());
        assert!(pool.try_admit(&extractor.extract(&headers, &orders)).unwrap());
    }

    #[tokio::test]
    async fn rejection_hook_fires_for_blocking_and_non_blocking_paths() {
        let rejected: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let hook_rejected = rejected.clone();
        let pool = KeyedLimiter::builder(|| {
            Arc::new(
                FixedWindowLimiter::new(FixedWindowConfig::new(1, Duration::from_secs(60)))
                    .unwrap(),
            ) as Arc<dyn Limiter>
        })
        .acquire_timeout(Duration::from_millis(20))
        .on_rejected(move |key, _| hook_rejected.lock().unwrap().push(key.to_string()))
        .build();

        assert!(pool.try_admit("k").unwrap());
        assert!(!pool.try_admit("k").unwrap());
        let err = pool.admit("k").await.unwrap_err();
        assert!(err.is_exceeded());

        assert_eq!(*rejected.lock().unwrap(), vec!["k".to_string(), "k".to_string()]);
    }

    #[tokio::test]
    async fn shared_store_supports_bulk_eviction() {
        let store = Arc::new(InMemoryLimiterStore::new());
        let pool = KeyedLimiter::builder(|| {
            Arc::new(
                FixedWindowLimiter::new(FixedWindowConfig::new(1, Duration::from_secs(60)))
                    .unwrap(),
            ) as Arc<dyn Limiter>
        })
        .store(store.clone())
        .build();

        assert!(pool.try_admit("tenant-a:read").unwrap());
        assert!(pool.try_admit("tenant-a:write").unwrap());
        assert!(pool.try_admit("tenant-b:read").unwrap());
        assert_eq!(store.len(), 3);

        store.remove_where(&|key, _| key.starts_with("tenant-a:"));
        assert_eq!(store.len(), 1);

        // Evicted keys start over with a fresh limiter.
        assert!(pool.try_admit("tenant-a:read").unwrap());
    }

    #[tokio::test]
    async fn concurrency_pool_round_trip() {
        let pool = KeyedLimiter::new(|| {
            Arc::new(ConcurrencyLimiter::new(ConcurrencyConfig::new(2)).unwrap())
                as Arc<dyn Limiter>
        });

        assert!(pool.try_admit("svc").unwrap());
        assert!(pool.try_admit("svc").unwrap());
        assert!(!pool.try_admit("svc").unwrap());

        pool.release("svc").unwrap();
        assert!(pool.try_admit("svc").unwrap());

        let stats = pool.stats_for("svc").unwrap();
        assert_eq!(stats.permits_acquired, 3);
        assert_eq!(stats.current_permits, 0);
    }

    #[tokio::test]
    async fn pool_shutdown_fails_queued_admissions() {
        let pool = Arc::new(KeyedLimiter::new(|| {
            Arc::new(ConcurrencyLimiter::new(ConcurrencyConfig::new(1)).unwrap())
                as Arc<dyn Limiter>
        }));
        assert!(pool.try_admit("svc").unwrap());

        let blocked = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.admit("svc").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        pool.shutdown();
        assert_eq!(blocked.await.unwrap(), Err(LimitError::Disposed));
        assert_eq!(pool.try_admit("svc").unwrap_err(), LimitError::Disposed);
        assert!(pool.stats_for("svc").is_none());
        pool.shutdown();
    }
}
