//! Minimal single-limiter usage: burst until empty, then wait for a refill.
//!
//! Run with: `cargo run --example basic`

use floodgate::{Limiter, TokenBucketConfig, TokenBucketLimiter};
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let limiter = TokenBucketLimiter::new(TokenBucketConfig::new(
        5,                          // burst capacity
        1,                          // tokens per refill
        Duration::from_millis(200), // refill cadence
    ))?;

    // Drain the initial burst.
    for request in 1..=7 {
        let admitted = limiter.try_acquire()?;
        println!("request {request}: {}", if admitted { "admitted" } else { "rejected" });
    }

    let stats = limiter.stats()?;
    println!(
        "acquired={} rejected={} tokens={}/{}",
        stats.permits_acquired, stats.permits_rejected, stats.current_permits, stats.max_permits
    );

    // Blocking admission: suspend until the next refill tick.
    let start = Instant::now();
    limiter.acquire(Some(Duration::from_secs(1))).await?;
    println!("blocking acquire granted after {:?}", start.elapsed());

    limiter.shutdown();
    Ok(())
}
