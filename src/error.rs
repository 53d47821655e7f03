//! Error types for admission control
use std::fmt;
use std::time::Duration;

/// Unified error type for limiter, pool, and store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitError {
    /// The request was not admitted. This is the one expected business
    /// outcome and must be handled by callers.
    Exceeded {
        /// Tag naming the algorithm that produced the rejection.
        algorithm: &'static str,
        /// Human-readable description of the rejection.
        message: String,
        /// Best estimate of how long until capacity is available again.
        retry_after: Option<Duration>,
    },
    /// The limiter, pool, or store was shut down before or during the call.
    Disposed,
}

impl fmt::Display for LimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exceeded { algorithm, message, retry_after } => {
                write!(f, "rate limit exceeded ({}): {}", algorithm, message)?;
                if let Some(wait) = retry_after {
                    write!(f, "; retry after {:?}", wait)?;
                }
                Ok(())
            }
            Self::Disposed => write!(f, "limiter has been shut down"),
        }
    }
}

impl std::error::Error for LimitError {}

impl LimitError {
    /// Construct an `Exceeded` error for a deadline that elapsed while waiting.
    pub(crate) fn deadline(algorithm: &'static str, retry_after: Option<Duration>) -> Self {
        Self::Exceeded {
            algorithm,
            message: "deadline elapsed before a permit was granted".to_string(),
            retry_after,
        }
    }

    /// Check if this error is a rate-limit rejection.
    pub fn is_exceeded(&self) -> bool {
        matches!(self, Self::Exceeded { .. })
    }

    /// Check if this error came from a disposed limiter, pool, or store.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// The algorithm tag, if this is an `Exceeded` error.
    pub fn algorithm(&self) -> Option<&'static str> {
        match self {
            Self::Exceeded { algorithm, .. } => Some(algorithm),
            Self::Disposed => None,
        }
    }

    /// The retry-after hint, if one was attached.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Exceeded { retry_after, .. } => *retry_after,
            Self::Disposed => None,
        }
    }
}

/// Construction-time parameter validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A count parameter that must be strictly positive was zero.
    ZeroCount(&'static str),
    /// A duration parameter that must be strictly positive was zero.
    ZeroDuration(&'static str),
    /// A composite key extractor needs at least two children.
    NotEnoughExtractors(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCount(field) => write!(f, "{} must be > 0", field),
            Self::ZeroDuration(field) => write!(f, "{} must be a positive duration", field),
            Self::NotEnoughExtractors(n) => {
                write!(f, "composite extractor needs at least 2 children (got {})", n)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exceeded_display_includes_algorithm_and_hint() {
        let err = LimitError::Exceeded {
            algorithm: "TokenBucket",
            message: "deadline elapsed before a permit was granted".to_string(),
            retry_after: Some(Duration::from_millis(80)),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("TokenBucket"));
        assert!(msg.contains("deadline elapsed"));
        assert!(msg.contains("80"));
    }

    #[test]
    fn exceeded_display_without_hint() {
        let err = LimitError::Exceeded {
            algorithm: "Concurrency",
            message: "deadline elapsed before a permit was granted".to_string(),
            retry_after: None,
        };
        let msg = format!("{}", err);
        assert!(!msg.contains("retry after"));
    }

    #[test]
    fn disposed_display() {
        let msg = format!("{}", LimitError::Disposed);
        assert!(msg.contains("shut down"));
    }

    #[test]
    fn predicates_and_accessors() {
        let err = LimitError::deadline("LeakyBucket", Some(Duration::from_millis(50)));
        assert!(err.is_exceeded());
        assert!(!err.is_disposed());
        assert_eq!(err.algorithm(), Some("LeakyBucket"));
        assert_eq!(err.retry_after(), Some(Duration::from_millis(50)));

        let disposed = LimitError::Disposed;
        assert!(disposed.is_disposed());
        assert_eq!(disposed.algorithm(), None);
        assert_eq!(disposed.retry_after(), None);
    }

    #[test]
    fn config_error_display() {
        assert!(format!("{}", ConfigError::ZeroCount("capacity")).contains("capacity"));
        assert!(
            format!("{}", ConfigError::ZeroDuration("refill_interval")).contains("refill_interval")
        );
        assert!(format!("{}", ConfigError::NotEnoughExtractors(1)).contains("got 1"));
    }
}
