//! Backoff policy for rate-limited batches.
//!
//! Decides how long the run pauses when the server signals a rate limit,
//! and how long a worker waits before resending a batch after a transient
//! transport failure.

use std::time::Duration;
use tracing::warn;

/// Configuration for rate limit handling.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Base delay for exponential backoff in milliseconds (default: 1000ms).
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds (default: 300000ms = 5 minutes).
    pub max_delay_ms: u64,
    /// Jitter factor as a fraction of computed delay (default: 0.25 = 25%).
    pub jitter_factor: f64,
    /// Maximum times a batch may be requeued after rate limiting (default: 10).
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 300_000, // 5 minutes
            jitter_factor: 0.25,
            max_retries: 10,
        }
    }
}

impl RateLimitConfig {
    /// Creates a new configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration optimized for testing (shorter delays).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            base_delay_ms: 10,
            max_delay_ms: 1000,
            jitter_factor: 0.0,
            max_retries: 3,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms == 0 {
            return Err("base_delay_ms must be > 0".to_string());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("max_delay_ms must be >= base_delay_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("jitter_factor must be in range [0.0, 1.0]".to_string());
        }
        Ok(())
    }

    /// Parses a `Retry-After` header value given in seconds.
    ///
    /// HTTP-date values are not supported and yield `None`.
    #[must_use]
    pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
        header_value
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    /// Calculates backoff delay with exponential growth.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64;
        let max = self.max_delay_ms as f64;

        // base * 2^attempt
        let delay_ms = (base * 2_f64.powi(attempt.min(63) as i32)).min(max);

        Duration::from_millis(delay_ms as u64)
    }

    /// Adds jitter to a delay using the configured factor.
    #[must_use]
    pub fn with_jitter(&self, delay: Duration) -> Duration {
        use rand::Rng;

        if self.jitter_factor == 0.0 {
            return delay;
        }

        let delay_ms = delay.as_millis() as f64;
        let jitter_range = delay_ms * self.jitter_factor;
        let jitter = rand::thread_rng().gen_range(0.0..=jitter_range);

        Duration::from_millis((delay_ms + jitter) as u64)
    }

    /// Returns how long the run should pause for a rate-limit signal.
    ///
    /// A server-provided delay is honoured as given, capped at
    /// `max_delay_ms`. Without one, exponential backoff with jitter applies.
    #[must_use]
    pub fn pause_duration(&self, retry_after: Option<Duration>, attempt: u32) -> Duration {
        let max = Duration::from_millis(self.max_delay_ms);
        match retry_after {
            Some(delay) if delay > max => {
                warn!(
                    "Retry-After {:?} exceeds max, capping at {:?}",
                    delay, max
                );
                max
            }
            Some(delay) => delay,
            None => self.with_jitter(self.backoff_delay(attempt)),
        }
    }
}
