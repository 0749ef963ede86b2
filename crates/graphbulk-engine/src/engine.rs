//! Run orchestration.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::aggregator::{FetchReport, ResultAggregator};
use crate::completion::CompletionTracker;
use crate::config::FetchConfig;
use crate::governor::RateGovernor;
use crate::metrics::FetchMetrics;
use crate::progress::{ProgressHook, ProgressReporter};
use crate::queue::WorkQueue;
use crate::transport::{BatchTransport, ResourceResolver};
use crate::types::{dedup_identifiers, partition};
use crate::worker::{BatchWorker, RunContext};
use crate::FetchError;

/// A run that stopped on a fatal error.
///
/// `partial` holds every identifier that reached a terminal outcome before
/// the abort; the rest are listed in `partial.unresolved`.
#[derive(Debug)]
pub struct FetchAbort {
    pub error: FetchError,
    pub partial: FetchReport,
}

impl fmt::Display for FetchAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetch aborted after {} of {} identifiers: {}",
            self.partial.completed(),
            self.partial.total(),
            self.error
        )
    }
}

impl std::error::Error for FetchAbort {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Requests a global stop of the engine's runs.
///
/// Once cancelled, the engine stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Bulk fetch engine.
pub struct FetchEngine {
    config: FetchConfig,
    resolver: Arc<dyn ResourceResolver>,
    transport: Arc<dyn BatchTransport>,
    progress_hook: Option<ProgressHook>,
    cancel: CancelHandle,
}

impl fmt::Debug for FetchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchEngine")
            .field("config", &self.config)
            .field("progress_hook", &self.progress_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl FetchEngine {
    /// Creates an engine.
    ///
    /// The transport is shared by all workers and must be safe for
    /// concurrent use.
    #[must_use]
    pub fn new(
        config: FetchConfig,
        resolver: Arc<dyn ResourceResolver>,
        transport: Arc<dyn BatchTransport>,
    ) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            config,
            resolver,
            transport,
            progress_hook: None,
            cancel: CancelHandle { tx: Arc::new(tx) },
        }
    }

    /// Installs a hook called with a progress snapshot every
    /// `config.progress_interval`.
    #[must_use]
    pub fn with_progress_hook(mut self, hook: ProgressHook) -> Self {
        self.progress_hook = Some(hook);
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Fetches `resource_path` for every identifier.
    ///
    /// Duplicate identifiers are fetched once. Returns the full report, or a
    /// [`FetchAbort`] carrying the partial report if the run hit a fatal
    /// error or was cancelled.
    #[instrument(skip(self, identifiers), fields(count = identifiers.len()))]
    pub async fn run(
        &self,
        identifiers: &[String],
        resource_path: &str,
    ) -> Result<FetchReport, FetchAbort> {
        let (identifiers, duplicates) = dedup_identifiers(identifiers);
        if duplicates > 0 {
            debug!("Dropped {} duplicate identifier(s)", duplicates);
        }
        let total = identifiers.len();

        let aggregator = ResultAggregator::new(identifiers.clone());
        let reject = |error: FetchError, aggregator: &ResultAggregator| FetchAbort {
            error,
            partial: aggregator.report(Default::default()),
        };

        if let Err(err) = self.config.validate() {
            return Err(reject(err, &aggregator));
        }
        if let Err(err) = self.resolver.validate(resource_path) {
            return Err(reject(err.into(), &aggregator));
        }

        let batches = partition(&identifiers, self.config.batch_size);
        info!(
            total,
            batches = batches.len(),
            workers = self.config.worker_count,
            batch_size = self.config.batch_size,
            "Starting bulk fetch of {}",
            resource_path
        );

        let metrics = Arc::new(FetchMetrics::new());
        let governor = Arc::new(RateGovernor::new(
            self.config.rate_limit.clone(),
            Arc::clone(&metrics),
        ));
        let tracker = Arc::new(CompletionTracker::new(total));
        let ctx = Arc::new(RunContext {
            resource_path: resource_path.to_string(),
            config: self.config.clone(),
            queue: WorkQueue::new(batches.len().max(1)),
            governor: Arc::clone(&governor),
            aggregator,
            tracker: Arc::clone(&tracker),
            metrics: Arc::clone(&metrics),
            resolver: Arc::clone(&self.resolver),
            transport: Arc::clone(&self.transport),
        });

        for batch in batches {
            if let Err(err) = ctx.queue.push(batch) {
                return Err(reject(err, &ctx.aggregator));
            }
        }

        let reporter = self.progress_hook.clone().map(|hook| {
            ProgressReporter::spawn(
                Arc::clone(&tracker),
                Arc::clone(&governor),
                self.config.progress_interval,
                hook,
            )
        });

        let mut workers = JoinSet::new();
        for index in 0..self.config.worker_count {
            workers.spawn(BatchWorker::new(index, Arc::clone(&ctx)).run());
        }

        loop {
            tokio::select! {
                () = tracker.wait_until_done() => break,
                () = governor.aborted() => break,
                () = self.cancel.cancelled() => {
                    governor.abort(FetchError::Cancelled);
                    break;
                }
                joined = workers.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(err)) => {
                        governor.abort(FetchError::Worker(err.to_string()));
                        break;
                    }
                    None => break,
                },
            }
        }

        // In-flight batches finish demultiplexing; queued ones are dropped.
        governor.end_pause();
        let dropped = ctx.queue.close();
        if dropped > 0 {
            warn!("{} queued batch(es) not sent", dropped);
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                governor.abort(FetchError::Worker(err.to_string()));
            }
        }

        if let Some(reporter) = reporter {
            reporter.finish().await;
        }

        let report = ctx.aggregator.report(metrics.snapshot());
        info!(
            completed = report.completed(),
            total,
            empty = report.empty.len(),
            failed = report.failed.len(),
            pauses = report.stats.pauses,
            "Bulk fetch finished"
        );

        match governor.take_abort_reason() {
            Some(error) => Err(FetchAbort {
                error,
                partial: report,
            }),
            None if !report.is_complete() => Err(FetchAbort {
                error: FetchError::Incomplete {
                    done: report.completed(),
                    total,
                },
                partial: report,
            }),
            None => Ok(report),
        }
    }
}
