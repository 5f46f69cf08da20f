use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Accounting state for one rate limit bucket, fed from response headers.
#[derive(Clone, Copy, Debug)]
struct Bucket {
    remaining: u32,
    reset_at: Instant,
}

/// Keyed bucket table shared by all callers of one client. Lock scope never
/// spans an await; waiting happens outside the lock.
#[derive(Debug, Default)]
pub struct BucketTable {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl BucketTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long a call on `key` must wait before it may be issued at `now`.
    /// `None` means the bucket has capacity (or is unknown/unbucketed).
    pub fn delay_for(&self, key: &str, now: Instant) -> Option<Duration> {
        let buckets = self.buckets.lock().ok()?;
        let bucket = buckets.get(key)?;

        if bucket.remaining == 0 && now < bucket.reset_at {
            Some(bucket.reset_at - now)
        } else {
            None
        }
    }

    /// Suspends the caller until the bucket for `key` has capacity.
    pub async fn acquire(&self, key: &str) {
        if let Some(delay) = self.delay_for(key, Instant::now()) {
            debug!(
                event_name = "rest.ratelimit.bucket_wait",
                bucket = key,
                delay_ms = delay.as_millis() as u64,
                "suspending call until bucket resets"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Updates the bucket from the `X-RateLimit-Remaining` /
    /// `X-RateLimit-Reset-After` header pair. Absence of both marks the
    /// route unbucketed and clears any stale entry.
    pub fn record(
        &self,
        key: &str,
        remaining: Option<u32>,
        reset_after_secs: Option<f64>,
        now: Instant,
    ) {
        let Ok(mut buckets) = self.buckets.lock() else {
            return;
        };

        match (remaining, reset_after_secs) {
            (Some(remaining), Some(reset_after_secs)) => {
                buckets.insert(
                    key.to_owned(),
                    Bucket {
                        remaining,
                        reset_at: now + Duration::from_secs_f64(reset_after_secs.max(0.0)),
                    },
                );
            }
            _ => {
                buckets.remove(key);
            }
        }
    }

    pub fn tracked_buckets(&self) -> usize {
        self.buckets.lock().map(|buckets| buckets.len()).unwrap_or(0)
    }
}
