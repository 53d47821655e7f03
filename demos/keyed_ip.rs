//! Per-client admission: extract a key from request headers, admit through
//! a pool that gives every client its own sliding window.
//!
//! Run with: `cargo run --example keyed_ip`

use floodgate::extract::{IpKeyExtractor, KeyExtractor};
use floodgate::keyed::KeyedLimiter;
use floodgate::{Limiter, SlidingWindowConfig, SlidingWindowLimiter};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Uri;
use std::sync::Arc;
use std::time::Duration;

fn request_from(ip: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_static(ip),
    );
    headers
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pool = KeyedLimiter::builder(|| {
        Arc::new(
            SlidingWindowLimiter::new(SlidingWindowConfig::new(3, Duration::from_secs(10)))
                .expect("valid config"),
        ) as Arc<dyn Limiter>
    })
    .on_rejected(|key, err| println!("  -> {key} throttled: {err}"))
    .build();

    let extractor = IpKeyExtractor::new();
    let uri: Uri = "/v1/items".parse()?;

    // One chatty client, one quiet one.
    let requests = [
        "203.0.113.7",
        "203.0.113.7",
        "203.0.113.7",
        "203.0.113.7",
        "198.51.100.2",
    ];
    for ip in requests {
        let key = extractor.extract(&request_from(ip), &uri);
        let admitted = pool.try_admit(&key)?;
        println!("{key}: {}", if admitted { "admitted" } else { "rejected" });
    }

    for key in ["203.0.113.7", "198.51.100.2"] {
        let stats = pool.stats_for(key).expect("pool is live");
        println!(
            "{key}: acquired={} rejected={} remaining={}",
            stats.permits_acquired, stats.permits_rejected, stats.current_permits
        );
    }

    pool.shutdown();
    Ok(())
}
