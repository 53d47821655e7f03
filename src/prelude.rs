//! Convenient re-exports for common Floodgate types.
pub use crate::{
    concurrency::{ConcurrencyConfig, ConcurrencyLimiter},
    error::{ConfigError, LimitError},
    extract::{
        CompositeKeyExtractor, CustomKeyExtractor, GlobalKeyExtractor, IpKeyExtractor,
        KeyExtractor, RouteKeyExtractor, UserKeyExtractor,
    },
    fixed_window::{FixedWindowConfig, FixedWindowLimiter},
    headers::RateLimitHeaders,
    keyed::store::{InMemoryLimiterStore, LimiterStore},
    keyed::{KeyedLimiter, KeyedLimiterBuilder},
    leaky_bucket::{LeakyBucketConfig, LeakyBucketLimiter},
    limiter::{Limiter, LimiterStats},
    sliding_log::{SlidingLogConfig, SlidingLogLimiter},
    sliding_window::{SlidingWindowConfig, SlidingWindowLimiter},
    token_bucket::{TokenBucketConfig, TokenBucketLimiter},
};
