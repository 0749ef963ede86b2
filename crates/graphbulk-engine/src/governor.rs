//! Global rate-limit governor.
//!
//! One instance per run, shared by all workers. When the server signals a
//! rate limit, exactly one worker becomes the waiter: it announces the
//! pause, sleeps for the retry delay and then releases everyone else.
//! Workers that want to submit while a pause is announced or active block
//! on the governor instead of sleeping themselves.
//!
//! ```text
//! Normal --try_announce(d)--> Announcing(d) --hold_pause--> Paused(d) --elapsed--> Normal
//!    \___________________________ abort() from any state ___________________> Aborted
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::metrics::FetchMetrics;
use crate::rate_limit::RateLimitConfig;
use crate::FetchError;

/// Governor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorState {
    /// Batches may be sent.
    Normal,
    /// A waiter has claimed the pause and is about to sleep.
    Announcing { retry_after: Duration },
    /// The waiter is sleeping until `resume_at`.
    Paused {
        retry_after: Duration,
        resume_at: Instant,
    },
    /// The run is stopping; no new batches may be sent.
    Aborted,
}

impl GovernorState {
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// True while a pause is announced or in progress.
    pub fn is_pausing(&self) -> bool {
        matches!(self, Self::Announcing { .. } | Self::Paused { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Time left before sending resumes, if a pause is in effect.
    #[must_use]
    pub fn retry_remaining(&self) -> Option<Duration> {
        match *self {
            Self::Announcing { retry_after } => Some(retry_after),
            Self::Paused { resume_at, .. } => {
                Some(resume_at.saturating_duration_since(Instant::now()))
            }
            Self::Normal | Self::Aborted => None,
        }
    }
}

impl fmt::Display for GovernorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Announcing { retry_after } => write!(f, "Announcing({retry_after:?})"),
            Self::Paused { retry_after, .. } => write!(f, "Paused({retry_after:?})"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Single source of truth for "may I send now?".
#[derive(Debug)]
pub struct RateGovernor {
    state: watch::Sender<GovernorState>,
    abort_reason: Mutex<Option<FetchError>>,
    config: RateLimitConfig,
    metrics: Arc<FetchMetrics>,
}

impl RateGovernor {
    /// Creates a governor in the `Normal` state.
    #[must_use]
    pub fn new(config: RateLimitConfig, metrics: Arc<FetchMetrics>) -> Self {
        let (state, _) = watch::channel(GovernorState::Normal);
        Self {
            state,
            abort_reason: Mutex::new(None),
            config,
            metrics,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> GovernorState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<GovernorState> {
        self.state.subscribe()
    }

    /// Returns how long to pause for a rate limit seen on a batch's `attempt`.
    #[must_use]
    pub fn pause_duration(&self, retry_after: Option<Duration>, attempt: u32) -> Duration {
        self.config.pause_duration(retry_after, attempt)
    }

    /// Tries to become the waiter for a new pause.
    ///
    /// Succeeds only from `Normal`; returns false if a pause is already
    /// announced or active, or the run is aborting.
    pub fn try_announce(&self, retry_after: Duration) -> bool {
        let claimed = self.state.send_if_modified(|state| {
            if state.is_normal() {
                *state = GovernorState::Announcing { retry_after };
                true
            } else {
                false
            }
        });
        if claimed {
            info!("Rate limited, pausing all workers for {:?}", retry_after);
        }
        claimed
    }

    /// Performs the pause claimed by [`try_announce`](Self::try_announce).
    ///
    /// Sleeps for `retry_after` (cut short by an abort or
    /// [`end_pause`](Self::end_pause)) and then returns the governor to
    /// `Normal`, releasing blocked workers.
    pub async fn hold_pause(&self, retry_after: Duration) {
        let started = Instant::now();
        let resume_at = started + retry_after;

        let paused = self.state.send_if_modified(|state| match *state {
            GovernorState::Announcing { retry_after } => {
                *state = GovernorState::Paused {
                    retry_after,
                    resume_at,
                };
                true
            }
            _ => false,
        });
        if !paused {
            debug!("No announced pause to hold");
            return;
        }

        tokio::select! {
            () = tokio::time::sleep(retry_after) => {}
            () = self.interrupted() => debug!("Pause interrupted"),
        }

        self.state.send_if_modified(|state| {
            if matches!(state, GovernorState::Paused { .. }) {
                *state = GovernorState::Normal;
                true
            } else {
                false
            }
        });

        let paused_for = started.elapsed();
        self.metrics.record_pause(paused_for);
        info!("Resuming after {:?} pause", paused_for);
    }

    /// Ends an announced or active pause early.
    ///
    /// Used once a run has nothing left to send.
    pub fn end_pause(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_pausing() {
                *state = GovernorState::Normal;
                true
            } else {
                false
            }
        })
    }

    async fn interrupted(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx
            .wait_for(|state| !matches!(state, GovernorState::Paused { .. }))
            .await;
    }

    /// Waits until batches may be sent.
    ///
    /// Returns false if the run was aborted instead.
    pub async fn wait_for_clearance(&self) -> bool {
        let mut rx = self.state.subscribe();
        let cleared = match rx
            .wait_for(|state| state.is_normal() || state.is_aborted())
            .await
        {
            Ok(state) => state.is_normal(),
            Err(_) => false,
        };
        cleared
    }

    /// Moves the governor to `Aborted`.
    ///
    /// The first reason wins; later calls only log. Returns true if this
    /// call caused the abort.
    pub fn abort(&self, reason: FetchError) -> bool {
        {
            let mut slot = self.abort_reason.lock();
            if slot.is_some() {
                debug!("Run already aborting, ignoring: {}", reason);
                return false;
            }
            error!("Aborting run: {}", reason);
            *slot = Some(reason);
        }
        self.state.send_replace(GovernorState::Aborted);
        true
    }

    /// Resolves once the governor is aborted.
    pub async fn aborted(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(GovernorState::is_aborted).await;
    }

    pub fn is_aborted(&self) -> bool {
        self.state().is_aborted()
    }

    /// Takes the reason recorded by [`abort`](Self::abort).
    pub fn take_abort_reason(&self) -> Option<FetchError> {
        self.abort_reason.lock().take()
    }
}
