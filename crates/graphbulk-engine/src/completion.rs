//! Completion tracking.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tracing::debug;

use crate::{FetchError, FetchResult};

/// Counts identifiers that reached a terminal outcome.
///
/// `done` never exceeds `total`; reaching `total` wakes every task blocked
/// in [`wait_until_done`](Self::wait_until_done).
#[derive(Debug)]
pub struct CompletionTracker {
    total: usize,
    done: AtomicUsize,
    finished: watch::Sender<bool>,
}

impl CompletionTracker {
    #[must_use]
    pub fn new(total: usize) -> Self {
        let (finished, _) = watch::channel(total == 0);
        Self {
            total,
            done: AtomicUsize::new(0),
            finished,
        }
    }

    /// Counts one more identifier as terminal and returns the new count.
    pub fn mark_terminal(&self) -> FetchResult<usize> {
        let total = self.total;
        let previous = self
            .done
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |done| {
                (done < total).then_some(done + 1)
            })
            .map_err(|_| FetchError::CompletionOverflow { total })?;

        let done = previous + 1;
        if done == total {
            debug!("All {} identifiers resolved", total);
            self.finished.send_replace(true);
        }
        Ok(done)
    }

    /// Returns `(done, total)` without blocking.
    pub fn snapshot(&self) -> (usize, usize) {
        (self.done.load(Ordering::Acquire), self.total)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire) == self.total
    }

    /// Waits until every identifier is terminal.
    pub async fn wait_until_done(&self) {
        let mut rx = self.finished.subscribe();
        let _ = rx.wait_for(|finished| *finished).await;
    }
}
