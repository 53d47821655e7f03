//! Rate-limit response header parsing.
//!
//! Interprets the de-facto standard `X-RateLimit-*` family plus
//! `Retry-After` from a server response, so clients can pace themselves
//! against server-side limits. Parsing never fails: absent or malformed
//! values simply come back as `None`.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const LIMIT: &str = "x-ratelimit-limit";
const REMAINING: &str = "x-ratelimit-remaining";
const RESET: &str = "x-ratelimit-reset";
const POLICY: &str = "x-ratelimit-policy";
const RETRY_AFTER: &str = "retry-after";

/// Parsed rate-limit signals from a server response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RateLimitHeaders {
    /// Total request budget for the current window.
    pub limit: Option<u64>,
    /// Requests left in the current window.
    pub remaining: Option<u64>,
    /// Time until the window resets, derived from the header's absolute
    /// epoch-seconds value. Zero when the advertised reset is in the past.
    pub reset: Option<Duration>,
    /// Server-requested wait before retrying. Only the delta-seconds form
    /// is understood; an HTTP-date value parses as `None`.
    pub retry_after: Option<Duration>,
    /// Free-form policy descriptor, verbatim.
    pub policy: Option<String>,
}

impl RateLimitHeaders {
    /// Parse whatever rate-limit signals a response carries. Header name
    /// matching is case-insensitive.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let reset = parse_u64(headers, RESET).map(|epoch| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            Duration::from_secs(epoch.saturating_sub(now))
        });
        let retry_after = header_str(headers, RETRY_AFTER)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|seconds| *seconds >= 0)
            .map(|seconds| Duration::from_secs(seconds as u64));
        Self {
            limit: parse_u64(headers, LIMIT),
            remaining: parse_u64(headers, REMAINING),
            reset,
            retry_after,
            policy: header_str(headers, POLICY).map(str::to_string),
        }
    }

    /// True when at least one rate-limit signal was present.
    pub fn any_present(&self) -> bool {
        self.limit.is_some()
            || self.remaining.is_some()
            || self.reset.is_some()
            || self.retry_after.is_some()
            || self.policy.is_some()
    }

    /// True when the server reports the budget as fully consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn parse_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|value| value.trim().parse().ok())
}
