//! Batch worker.
//!
//! Each worker loops: pop a batch, wait for the governor, resolve one
//! request per identifier, submit them as one batch call and demultiplex the
//! per-step results. Only the identifiers still pending after a rate limit
//! are pushed back; resolved identifiers are never resubmitted.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::aggregator::ResultAggregator;
use crate::completion::CompletionTracker;
use crate::config::{FetchConfig, StepErrorPolicy};
use crate::governor::RateGovernor;
use crate::metrics::FetchMetrics;
use crate::queue::WorkQueue;
use crate::transport::{BatchResponse, BatchStep, BatchTransport, ResourceResolver, StepResult};
use crate::types::{Batch, Outcome, StepId};
use crate::{FetchError, FetchResult, TransportError};

/// State shared by every worker of one run.
pub(crate) struct RunContext {
    pub resource_path: String,
    pub config: FetchConfig,
    pub queue: WorkQueue,
    pub governor: Arc<RateGovernor>,
    pub aggregator: ResultAggregator,
    pub tracker: Arc<CompletionTracker>,
    pub metrics: Arc<FetchMetrics>,
    pub resolver: Arc<dyn ResourceResolver>,
    pub transport: Arc<dyn BatchTransport>,
}

/// Result of handing a batch to the transport.
enum Submission {
    Delivered(BatchResponse),
    /// The batch endpoint itself was rate limited; nothing was processed.
    RateLimited(Option<Duration>),
}

pub(crate) struct BatchWorker {
    index: usize,
    ctx: Arc<RunContext>,
}

impl BatchWorker {
    pub fn new(index: usize, ctx: Arc<RunContext>) -> Self {
        Self { index, ctx }
    }

    /// Runs until the queue closes or the run aborts.
    pub async fn run(self) {
        debug!(worker = self.index, "Worker started");

        while let Some(batch) = self.ctx.queue.pop().await {
            if !self.ctx.governor.wait_for_clearance().await {
                break;
            }
            if let Err(err) = self.process(batch).await {
                self.ctx.governor.abort(err);
                break;
            }
        }

        debug!(worker = self.index, "Worker stopped");
    }

    #[instrument(
        skip(self, batch),
        fields(worker = self.index, size = batch.len(), attempt = batch.attempt())
    )]
    async fn process(&self, batch: Batch) -> FetchResult<()> {
        let attempt = batch.attempt();
        let steps = self.build_steps(&batch)?;
        if steps.is_empty() {
            return Ok(());
        }

        let mut responses = match self.submit(&steps).await? {
            Submission::Delivered(responses) => responses,
            Submission::RateLimited(retry_after) => {
                self.ctx
                    .metrics
                    .increment_rate_limited_steps(steps.len() as u64);
                let pending = steps.into_iter().map(|step| step.identifier).collect();
                return self.reschedule(pending, attempt, Some(retry_after)).await;
            }
        };

        let mut pending = Vec::new();
        let mut rate_limit: Option<Option<Duration>> = None;
        let mut fatal = None;

        for step in steps {
            match responses.remove(&step.id) {
                Some(StepResult::Payload(fragments)) => {
                    self.complete(&step.identifier, Outcome::Success(fragments))?;
                }
                Some(StepResult::NotFound) => {
                    self.complete(&step.identifier, Outcome::Empty)?;
                }
                Some(StepResult::RateLimited { retry_after }) => {
                    self.ctx.metrics.increment_rate_limited_steps(1);
                    let longest = rate_limit.flatten().max(retry_after);
                    rate_limit = Some(longest);
                    pending.push(step.identifier);
                }
                Some(StepResult::Failed { status, detail }) => {
                    match self.ctx.config.step_error_policy {
                        StepErrorPolicy::RecordFailure => {
                            warn!(
                                identifier = %step.identifier,
                                ?status,
                                "Step failed: {}",
                                detail
                            );
                            let reason = match status {
                                Some(status) => format!("HTTP {status}: {detail}"),
                                None => detail,
                            };
                            self.complete(&step.identifier, Outcome::Failed(reason))?;
                        }
                        StepErrorPolicy::Abort => {
                            fatal.get_or_insert(FetchError::StepFailed {
                                identifier: step.identifier,
                                status,
                                detail,
                            });
                        }
                    }
                }
                None => {
                    debug!(
                        step = %step.id,
                        identifier = %step.identifier,
                        "Step missing from response"
                    );
                    pending.push(step.identifier);
                }
            }
        }

        if !responses.is_empty() {
            warn!("Ignoring {} response(s) with unknown step ids", responses.len());
        }

        // Everything answered in this batch is recorded before aborting.
        if let Some(err) = fatal {
            return Err(err);
        }

        self.reschedule(pending, attempt, rate_limit).await
    }

    /// Resolves a request per identifier; resolution failures are terminal.
    fn build_steps(&self, batch: &Batch) -> FetchResult<Vec<BatchStep>> {
        let mut steps = Vec::with_capacity(batch.len());
        for (index, identifier) in batch.identifiers().iter().enumerate() {
            match self
                .ctx
                .resolver
                .resolve(&self.ctx.resource_path, identifier)
            {
                Ok(request) => steps.push(BatchStep {
                    id: StepId::new(index as u32 + 1),
                    identifier: identifier.clone(),
                    request,
                }),
                Err(err) => {
                    warn!(identifier = %identifier, "Cannot resolve request: {}", err);
                    self.complete(identifier, Outcome::Failed(err.to_string()))?;
                }
            }
        }
        Ok(steps)
    }

    /// Sends the batch, resending after transport failures up to the
    /// configured limit.
    async fn submit(&self, steps: &[BatchStep]) -> FetchResult<Submission> {
        let limit = self.ctx.config.transport_retry_limit;
        let mut retries = 0u32;

        loop {
            self.ctx.metrics.record_submission(steps.len());
            match self.ctx.transport.submit_batch(steps).await {
                Ok(responses) => return Ok(Submission::Delivered(responses)),
                Err(TransportError::RateLimited { retry_after }) => {
                    return Ok(Submission::RateLimited(retry_after));
                }
                Err(TransportError::Transport(detail)) if retries < limit => {
                    let delay = self.ctx.config.rate_limit.backoff_delay(retries);
                    retries += 1;
                    self.ctx.metrics.increment_transport_retries();
                    warn!(
                        "Batch request failed, retry {}/{} after {:?}: {}",
                        retries, limit, delay, detail
                    );
                    if !self.sleep_unless_aborted(delay).await
                        || !self.ctx.governor.wait_for_clearance().await
                    {
                        return Err(FetchError::Transport(detail));
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Sleeps for `delay` unless the run aborts first.
    ///
    /// Returns false if the run was aborted.
    async fn sleep_unless_aborted(&self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => !self.ctx.governor.is_aborted(),
            () = self.ctx.governor.aborted() => false,
        }
    }

    /// Requeues the still-pending identifiers and triggers the global pause
    /// once for this batch if it was rate limited.
    ///
    /// A subset pending only because its steps were missing from the
    /// response backs off locally instead of pausing every worker.
    async fn reschedule(
        &self,
        pending: Vec<String>,
        attempt: u32,
        rate_limit: Option<Option<Duration>>,
    ) -> FetchResult<()> {
        if pending.is_empty() || self.ctx.governor.is_aborted() {
            return Ok(());
        }

        let pause =
            rate_limit.map(|retry_after| self.ctx.governor.pause_duration(retry_after, attempt));
        let is_waiter = pause.is_some_and(|delay| self.ctx.governor.try_announce(delay));

        let next_attempt = attempt + 1;
        if next_attempt > self.ctx.config.rate_limit.max_retries {
            warn!(
                "Giving up on {} identifier(s) after {} retries",
                pending.len(),
                attempt
            );
            let reason = if rate_limit.is_some() {
                format!("rate limit retries exhausted after {attempt} attempts")
            } else {
                format!("no response after {attempt} attempts")
            };
            for identifier in &pending {
                self.complete(identifier, Outcome::Failed(reason.clone()))?;
            }
        } else {
            if rate_limit.is_none() {
                let delay = self.ctx.config.rate_limit.backoff_delay(attempt);
                debug!(
                    "{} step(s) missing from response, resending after {:?}",
                    pending.len(),
                    delay
                );
                if !self.sleep_unless_aborted(delay).await {
                    return Ok(());
                }
            }
            debug!(
                "Requeueing {} pending identifier(s), attempt {}",
                pending.len(),
                next_attempt
            );
            self.ctx.metrics.increment_requeued();
            self.ctx.queue.push(Batch::retry(pending, next_attempt))?;
        }

        if let (true, Some(delay)) = (is_waiter, pause) {
            self.ctx.governor.hold_pause(delay).await;
        }
        Ok(())
    }

    fn complete(&self, identifier: &str, outcome: Outcome) -> FetchResult<()> {
        self.ctx.aggregator.record(identifier, outcome)?;
        self.ctx.tracker.mark_terminal()?;
        Ok(())
    }
}
