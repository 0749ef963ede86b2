//! Run statistics.
//!
//! Counters are updated by workers and the governor without locking and
//! read back as a [`FetchStats`] snapshot at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Batch calls sent to the transport, including resends.
    pub batches_submitted: u64,
    /// Steps sent across all batch calls.
    pub steps_submitted: u64,
    /// Steps answered with a rate-limit status.
    pub rate_limited_steps: u64,
    /// Batches pushed back onto the queue.
    pub requeued_batches: u64,
    /// Batch calls resent after a transport failure.
    pub transport_retries: u64,
    /// Global pauses taken.
    pub pauses: u64,
    /// Wall-clock time spent paused.
    pub paused_for: Duration,
}

impl FetchStats {
    /// Returns the share of submitted steps that were rate limited.
    #[must_use]
    pub fn rate_limit_ratio(&self) -> f64 {
        if self.steps_submitted == 0 {
            0.0
        } else {
            self.rate_limited_steps as f64 / self.steps_submitted as f64
        }
    }
}

/// Lock-free run counters.
#[derive(Debug, Default)]
pub struct FetchMetrics {
    batches_submitted: AtomicU64,
    steps_submitted: AtomicU64,
    rate_limited_steps: AtomicU64,
    requeued_batches: AtomicU64,
    transport_retries: AtomicU64,
    pauses: AtomicU64,
    paused_ms: AtomicU64,
}

impl FetchMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one batch call carrying `steps` requests.
    pub fn record_submission(&self, steps: usize) {
        self.batches_submitted.fetch_add(1, Ordering::Relaxed);
        self.steps_submitted
            .fetch_add(steps as u64, Ordering::Relaxed);
    }

    pub fn increment_rate_limited_steps(&self, count: u64) {
        self.rate_limited_steps.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_requeued(&self) {
        self.requeued_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transport_retries(&self) {
        self.transport_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed global pause.
    pub fn record_pause(&self, paused_for: Duration) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
        self.paused_ms
            .fetch_add(paused_for.as_millis() as u64, Ordering::Relaxed);
    }

    /// Returns a snapshot of current counters.
    #[must_use]
    pub fn snapshot(&self) -> FetchStats {
        FetchStats {
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            steps_submitted: self.steps_submitted.load(Ordering::Relaxed),
            rate_limited_steps: self.rate_limited_steps.load(Ordering::Relaxed),
            requeued_batches: self.requeued_batches.load(Ordering::Relaxed),
            transport_retries: self.transport_retries.load(Ordering::Relaxed),
            pauses: self.pauses.load(Ordering::Relaxed),
            paused_for: Duration::from_millis(self.paused_ms.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metrics() {
        let stats = FetchMetrics::new().snapshot();
        assert_eq!(stats, FetchStats::default());
        assert_eq!(stats.paused_for, Duration::ZERO);
    }

    #[test]
    fn test_submission_tracking() {
        let metrics = FetchMetrics::new();
        metrics.record_submission(20);
        metrics.record_submission(5);

        let stats = metrics.snapshot();
        assert_eq!(stats.batches_submitted, 2);
        assert_eq!(stats.steps_submitted, 25);
    }

    #[test]
    fn test_pause_tracking() {
        let metrics = FetchMetrics::new();
        metrics.record_pause(Duration::from_millis(1500));
        metrics.record_pause(Duration::from_millis(500));

        let stats = metrics.snapshot();
        assert_eq!(stats.pauses, 2);
        assert_eq!(stats.paused_for, Duration::from_secs(2));
    }

    #[test]
    fn test_rate_limit_ratio() {
        let metrics = FetchMetrics::new();
        assert_eq!(metrics.snapshot().rate_limit_ratio(), 0.0);

        metrics.record_submission(10);
        metrics.increment_rate_limited_steps(2);
        assert_eq!(metrics.snapshot().rate_limit_ratio(), 0.2);
    }

    #[test]
    fn test_retry_counters() {
        let metrics = FetchMetrics::new();
        metrics.increment_requeued();
        metrics.increment_requeued();
        metrics.increment_transport_retries();

        let stats = metrics.snapshot();
        assert_eq!(stats.requeued_batches, 2);
        assert_eq!(stats.transport_retries, 1);
    }
}
