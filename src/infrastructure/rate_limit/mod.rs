use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Token bucket shared by every outbound synthesis call.
///
/// Each caller reserves a token up front; when the balance goes negative the caller sleeps
/// for the deficit, so admissions are spaced at `1 / rate` once the burst is spent.
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    updated: Instant,
}

impl RateLimiter {
    /// `requests_per_second` must be positive; `burst` is clamped to `[1, requests_per_second]`
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let rate = requests_per_second.max(f64::MIN_POSITIVE);
        let capacity = f64::from(burst).min(rate).max(1.0);
        Self {
            rate,
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                updated: Instant::now(),
            }),
        }
    }

    pub fn requests_per_second(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Wait until this caller may issue one request
    pub async fn acquire(&self) {
        let wait = {
            let mut bucket = self.bucket.lock().await;
            let now = Instant::now();
            let elapsed = now.saturating_duration_since(bucket.updated).as_secs_f64();
            bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
            bucket.updated = now;
            bucket.tokens -= 1.0;

            if bucket.tokens >= 0.0 {
                None
            } else {
                Some(Duration::from_secs_f64(-bucket.tokens / self.rate))
            }
        };

        if let Some(wait) = wait {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate limiter delaying request");
            sleep(wait).await;
        }
    }
}
