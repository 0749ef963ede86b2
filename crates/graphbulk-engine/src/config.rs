//! Engine configuration.

use std::time::Duration;

use crate::rate_limit::RateLimitConfig;
use crate::FetchError;

/// What a worker does when a step fails with a status that is neither
/// "not found" nor a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepErrorPolicy {
    /// Abort the whole run.
    #[default]
    Abort,
    /// Record the identifier as failed and keep going.
    RecordFailure,
}

/// Configuration for a fetch run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Number of concurrent batch workers (default: 4).
    pub worker_count: usize,
    /// Maximum identifiers per batch call (default: 20).
    pub batch_size: usize,
    /// How many times a failed batch call is resent before the run aborts.
    /// Zero makes every transport failure fatal (default: 0).
    pub transport_retry_limit: u32,
    /// Handling of per-step errors (default: abort).
    pub step_error_policy: StepErrorPolicy,
    /// Cadence of the progress hook (default: 100ms).
    pub progress_interval: Duration,
    /// Rate limit backoff settings.
    pub rate_limit: RateLimitConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            batch_size: 20,
            transport_retry_limit: 0,
            step_error_policy: StepErrorPolicy::Abort,
            progress_interval: Duration::from_millis(100),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl FetchConfig {
    /// Creates a configuration optimized for testing (short delays and cadence).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            progress_interval: Duration::from_millis(10),
            rate_limit: RateLimitConfig::for_testing(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_rate_limit_retries(mut self, max_retries: u32) -> Self {
        self.rate_limit.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_transport_retry_limit(mut self, limit: u32) -> Self {
        self.transport_retry_limit = limit;
        self
    }

    #[must_use]
    pub fn with_step_error_policy(mut self, policy: StepErrorPolicy) -> Self {
        self.step_error_policy = policy;
        self
    }

    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.worker_count == 0 {
            return Err(FetchError::Config("worker_count must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(FetchError::Config("batch_size must be > 0".to_string()));
        }
        if self.progress_interval.is_zero() {
            return Err(FetchError::Config(
                "progress_interval must be > 0".to_string(),
            ));
        }
        self.rate_limit
            .validate()
            .map_err(|e| FetchError::Config(format!("Invalid rate limit config: {e}")))
    }

    /// Load configuration from environment variables, starting from defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Recognised variables: `GRAPHBULK_WORKERS`, `GRAPHBULK_BATCH_SIZE`,
    /// `GRAPHBULK_MAX_RETRIES`, `GRAPHBULK_TRANSPORT_RETRIES`,
    /// `GRAPHBULK_PROGRESS_INTERVAL_MS`. Unset variables keep their default.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let mut config = Self::default();

        if let Some(workers) = read_parsed::<usize, _>(&reader, "GRAPHBULK_WORKERS")? {
            config.worker_count = workers;
        }
        if let Some(batch_size) = read_parsed::<usize, _>(&reader, "GRAPHBULK_BATCH_SIZE")? {
            config.batch_size = batch_size;
        }
        if let Some(retries) = read_parsed::<u32, _>(&reader, "GRAPHBULK_MAX_RETRIES")? {
            config.rate_limit.max_retries = retries;
        }
        if let Some(limit) = read_parsed::<u32, _>(&reader, "GRAPHBULK_TRANSPORT_RETRIES")? {
            config.transport_retry_limit = limit;
        }
        if let Some(ms) = read_parsed::<u64, _>(&reader, "GRAPHBULK_PROGRESS_INTERVAL_MS")? {
            config.progress_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn read_parsed<T, F>(reader: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    match reader(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl From<ConfigError> for FetchError {
    fn from(err: ConfigError) -> Self {
        FetchError::Config(err.to_string())
    }
}
