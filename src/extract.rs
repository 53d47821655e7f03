//! Key-extraction strategies.
//!
//! A [`KeyExtractor`] maps request metadata to the string key a
//! [`crate::keyed::KeyedLimiter`] partitions admission by. Extraction is
//! deterministic: the same headers and URI always produce the same key.

use http::{HeaderMap, HeaderName, Uri};

/// Key shared by every request under [`GlobalKeyExtractor`].
pub const GLOBAL_KEY: &str = "__global__";

/// Derive a partition key from request metadata.
pub trait KeyExtractor: Send + Sync {
    /// Map request headers and URI to a stable partition key.
    fn extract(&self, headers: &HeaderMap, uri: &Uri) -> String;
}

/// Single shared partition: every caller maps to [`GLOBAL_KEY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalKeyExtractor;

impl KeyExtractor for GlobalKeyExtractor {
    fn extract(&self, _headers: &HeaderMap, _uri: &Uri) -> String {
        GLOBAL_KEY.to_string()
    }
}

/// Partition by originating client address.
///
/// Reads the first element of a comma-separated forwarding header, then a
/// single-value real-IP header, then falls back to a fixed key. Header
/// lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct IpKeyExtractor {
    forwarded_for_header: HeaderName,
    real_ip_header: HeaderName,
    fallback_key: String,
}

impl IpKeyExtractor {
    /// `x-forwarded-for`, then `x-real-ip`, then `"unknown"`.
    pub fn new() -> Self {
        Self {
            forwarded_for_header: HeaderName::from_static("x-forwarded-for"),
            real_ip_header: HeaderName::from_static("x-real-ip"),
            fallback_key: "unknown".to_string(),
        }
    }

    /// Override the forwarding header.
    pub fn with_forwarded_for_header(mut self, header: HeaderName) -> Self {
        self.forwarded_for_header = header;
        self
    }

    /// Override the real-IP header.
    pub fn with_real_ip_header(mut self, header: HeaderName) -> Self {
        self.real_ip_header = header;
        self
    }

    /// Override the fallback key used when neither header is usable.
    pub fn with_fallback_key(mut self, key: impl Into<String>) -> Self {
        self.fallback_key = key.into();
        self
    }
}

impl Default for IpKeyExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyExtractor for IpKeyExtractor {
    fn extract(&self, headers: &HeaderMap, _uri: &Uri) -> String {
        let forwarded = headers
            .get(&self.forwarded_for_header)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
        headers
            .get(&self.real_ip_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.fallback_key)
            .to_string()
    }
}

/// Partition by an opaque user identifier header.
#[derive(Debug, Clone)]
pub struct UserKeyExtractor {
    header: HeaderName,
    fallback_key: String,
}

impl UserKeyExtractor {
    /// `x-user-id`, falling back to `"anonymous"`.
    pub fn new() -> Self {
        Self {
            header: HeaderName::from_static("x-user-id"),
            fallback_key: "anonymous".to_string(),
        }
    }

    /// Override the identifier header.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    /// Override the fallback key for unidentified callers.
    pub fn with_fallback_key(mut self, key: impl Into<String>) -> Self {
        self.fallback_key = key.into();
        self
    }
}

impl Default for UserKeyExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyExtractor for UserKeyExtractor {
    fn extract(&self, headers: &HeaderMap, _uri: &Uri) -> String {
        headers
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.fallback_key)
            .to_string()
    }
}

/// Partition by request path.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteKeyExtractor;

impl KeyExtractor for RouteKeyExtractor {
    fn extract(&self, _headers: &HeaderMap, uri: &Uri) -> String {
        uri.path().to_string()
    }
}

/// Partition by a caller-supplied function.
pub struct CustomKeyExtractor {
    func: Box<dyn Fn(&HeaderMap, &Uri) -> String + Send + Sync>,
}

impl CustomKeyExtractor {
    /// Wrap an arbitrary extraction function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&HeaderMap, &Uri) -> String + Send + Sync + 'static,
    {
        Self { func: Box::new(func) }
    }
}

impl KeyExtractor for CustomKeyExtractor {
    fn extract(&self, headers: &HeaderMap, uri: &Uri) -> String {
        (self.func)(headers, uri)
    }
}

/// Partition by the joined output of two or more extractors.
pub struct CompositeKeyExtractor {
    extractors: Vec<Box<dyn KeyExtractor>>,
    separator: String,
}

impl std::fmt::Debug for CompositeKeyExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeKeyExtractor")
            .field("extractors", &self.extractors.len())
            .field("separator", &self.separator)
            .finish()
    }
}

impl CompositeKeyExtractor {
    /// Combine extractors with the default `":"` separator. Fails with
    /// fewer than two children.
    pub fn new(
        extractors: Vec<Box<dyn KeyExtractor>>,
    ) -> Result<Self, crate::ConfigError> {
        if extractors.len() < 2 {
            return Err(crate::ConfigError::NotEnoughExtractors(extractors.len()));
        }
        Ok(Self { extractors, separator: ":".to_string() })
    }

    /// Override the join separator.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl KeyExtractor for CompositeKeyExtractor {
    fn extract(&self, headers: &HeaderMap, uri: &Uri) -> String {
        self.extractors
            .iter()
            .map(|extractor| extractor.extract(headers, uri))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}
