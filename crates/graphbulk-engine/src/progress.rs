//! Progress reporting.
//!
//! A read-only view over the completion tracker and the governor, pushed to
//! a caller-supplied hook on a fixed cadence from its own task.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::completion::CompletionTracker;
use crate::governor::{GovernorState, RateGovernor};

/// Callback receiving progress snapshots.
pub type ProgressHook = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Coarse run phase derived from the governor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Running,
    /// A pause is about to start.
    PauseAnnounced,
    Paused,
    Aborting,
}

impl From<GovernorState> for ProgressPhase {
    fn from(state: GovernorState) -> Self {
        match state {
            GovernorState::Normal => Self::Running,
            GovernorState::Announcing { .. } => Self::PauseAnnounced,
            GovernorState::Paused { .. } => Self::Paused,
            GovernorState::Aborted => Self::Aborting,
        }
    }
}

/// Point-in-time progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub done: usize,
    pub total: usize,
    pub phase: ProgressPhase,
    /// Time until sending resumes, while paused.
    pub retry_remaining: Option<Duration>,
}

impl ProgressSnapshot {
    /// Reads the tracker and governor once.
    #[must_use]
    pub fn capture(tracker: &CompletionTracker, governor: &RateGovernor) -> Self {
        let (done, total) = tracker.snapshot();
        let state = governor.state();
        Self {
            done,
            total,
            phase: state.into(),
            retry_remaining: state.retry_remaining(),
        }
    }

    /// Completion percentage, 100 for an empty run.
    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            100
        } else {
            (self.done as u64 * 100) / self.total as u64
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(
            self.phase,
            ProgressPhase::PauseAnnounced | ProgressPhase::Paused
        )
    }

    /// Whole seconds left in the current pause, rounded up.
    pub fn retry_seconds(&self) -> Option<u64> {
        self.retry_remaining
            .map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0))
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " {}/{} ({}%)", self.done, self.total, self.percent())?;
        match (self.phase, self.retry_seconds()) {
            (ProgressPhase::PauseAnnounced | ProgressPhase::Paused, Some(secs)) => write!(
                f,
                " PAUSED: Too many requests, please wait for {secs} seconds..."
            ),
            (ProgressPhase::Aborting, _) => write!(f, " ABORTING"),
            _ => Ok(()),
        }
    }
}

/// Background task invoking a [`ProgressHook`] every `interval`.
#[derive(Debug)]
pub struct ProgressReporter {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Starts reporting. The first snapshot is delivered immediately.
    #[must_use]
    pub fn spawn(
        tracker: Arc<CompletionTracker>,
        governor: Arc<RateGovernor>,
        interval: Duration,
        hook: ProgressHook,
    ) -> Self {
        let (stop, mut stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => hook(&ProgressSnapshot::capture(&tracker, &governor)),
                    _ = &mut stop_rx => break,
                }
            }
            hook(&ProgressSnapshot::capture(&tracker, &governor));
        });
        Self { stop, handle }
    }

    /// Stops the task after one final snapshot.
    pub async fn finish(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}
