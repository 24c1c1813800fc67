use rand::Rng;
use std::time::Duration;

/// Retry budget and exponential backoff for synthesis attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Relative jitter in `[0, 1]`; zero disables it
    pub jitter: f64,
    /// Forced token refreshes tolerated per run
    pub max_auth_refreshes: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
            max_auth_refreshes: 5,
        }
    }
}

impl RetryPolicy {
    /// Whether a job with `attempts_made` counted failures may try again
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made <= self.max_retries
    }

    /// Backoff before retry number `retry_number` (1-based), without jitter
    pub fn backoff(&self, retry_number: u32) -> Duration {
        let exponent = retry_number.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Backoff with jitter applied
    pub fn delay_for(&self, retry_number: u32) -> Duration {
        let delay = self.backoff(retry_number);
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let jitter = self.jitter.min(1.0);
        let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
        delay.mul_f64(factor)
    }
}
