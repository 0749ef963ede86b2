//! Work queue of pending batches.
//!
//! A bounded multi-producer multi-consumer FIFO. Workers pop batches and
//! push back the still-pending subset after a rate limit. Since a batch is
//! only ever replaced by a smaller one, a queue sized to the initial
//! partition never fills up.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::types::Batch;
use crate::{FetchError, FetchResult};

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<Batch>,
    closed: bool,
}

/// Bounded queue of batches with blocking pop.
#[derive(Debug)]
pub struct WorkQueue {
    inner: Mutex<QueueInner>,
    available: Notify,
    max_depth: usize,
}

impl WorkQueue {
    /// Creates a new queue with the given capacity.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                pending: VecDeque::with_capacity(max_depth),
                closed: false,
            }),
            available: Notify::new(),
            max_depth,
        }
    }

    /// Returns the maximum queue depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the number of batches waiting to be popped.
    pub fn depth(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Checks if the queue is full.
    pub fn is_full(&self) -> bool {
        self.depth() >= self.max_depth
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Appends a batch and wakes one waiting worker.
    ///
    /// Never blocks. Fails if the queue is full or closed.
    pub fn push(&self, batch: Batch) -> FetchResult<()> {
        let depth = {
            let mut inner = self.inner.lock();
            if inner.closed {
                warn!("Work queue closed, dropping batch of {}", batch.len());
                return Err(FetchError::QueueClosed);
            }
            let current = inner.pending.len();
            if current >= self.max_depth {
                warn!("Work queue full ({} batches)", current);
                return Err(FetchError::QueueFull {
                    queue_depth: current,
                });
            }
            inner.pending.push_back(batch);
            inner.pending.len()
        };

        debug!("Batch enqueued, depth: {}", depth);
        self.available.notify_one();
        Ok(())
    }

    /// Takes the oldest batch, waiting until one is available.
    ///
    /// Returns `None` once the queue is closed. Batches still queued at
    /// close time are not handed out.
    pub async fn pop(&self) -> Option<Batch> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the
            // await is not missed.
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return None;
                }
                if let Some(batch) = inner.pending.pop_front() {
                    return Some(batch);
                }
            }

            notified.await;
        }
    }

    /// Closes the queue and wakes every waiting worker.
    ///
    /// Returns the number of batches that were still pending.
    pub fn close(&self) -> usize {
        let dropped = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            let dropped = inner.pending.len();
            inner.pending.clear();
            dropped
        };
        if dropped > 0 {
            debug!("Work queue closed with {} batches pending", dropped);
        }
        self.available.notify_waiters();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn batch(ids: &[&str]) -> Batch {
        Batch::new(ids.iter().map(|s| (*s).to_string()).collect())
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = WorkQueue::new(10);
        queue.push(batch(&["a"])).unwrap();
        queue.push(batch(&["b"])).unwrap();
        queue.push(batch(&["c"])).unwrap();

        assert_eq!(queue.pop().await.unwrap().identifiers()[0], "a");
        assert_eq!(queue.pop().await.unwrap().identifiers()[0], "b");
        assert_eq!(queue.pop().await.unwrap().identifiers()[0], "c");
    }

    #[tokio::test]
    async fn test_queue_full_returns_error() {
        let queue = WorkQueue::new(2);
        queue.push(batch(&["1"])).unwrap();
        queue.push(batch(&["2"])).unwrap();
        assert!(queue.is_full());

        let result = queue.push(batch(&["3"]));
        assert!(matches!(
            result,
            Err(FetchError::QueueFull { queue_depth: 2 })
        ));
    }

    #[tokio::test]
    async fn test_depth_tracking() {
        let queue = WorkQueue::new(10);
        assert_eq!(queue.depth(), 0);

        queue.push(batch(&["a"])).unwrap();
        queue.push(batch(&["b"])).unwrap();
        assert_eq!(queue.depth(), 2);

        let _ = queue.pop().await;
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(WorkQueue::new(4));

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.push(batch(&["late"])).unwrap();
        let popped = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("pop should wake up")
            .unwrap();
        assert_eq!(popped.unwrap().identifiers()[0], "late");
    }

    #[tokio::test]
    async fn test_close_wakes_all_waiters() {
        let queue = Arc::new(WorkQueue::new(4));

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.pop().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        for waiter in waiters {
            let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("close should wake every waiter")
                .unwrap();
            assert!(popped.is_none());
        }
    }

    #[tokio::test]
    async fn test_push_after_close_fails() {
        let queue = WorkQueue::new(4);
        queue.push(batch(&["a"])).unwrap();
        assert_eq!(queue.close(), 1);
        assert!(queue.is_closed());
        assert!(matches!(
            queue.push(batch(&["b"])),
            Err(FetchError::QueueClosed)
        ));
        assert!(queue.pop().await.is_none());
    }
}
