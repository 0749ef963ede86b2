//! Common test utilities for graphbulk-engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use graphbulk_engine::{
    BatchResponse, BatchStep, BatchTransport, FetchConfig, FetchEngine, RequestDescriptor,
    ResolutionError, ResourceResolver, StepResult, TransportError,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Generates `count` identifiers `u-0..u-{count-1}`.
pub fn ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("u-{i}")).collect()
}

pub fn strs(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

/// Resolver producing `/users/{id}/{path}`.
///
/// Identifiers starting with `bad` cannot be resolved and paths other than
/// `authentication/methods` and `memberOf` are rejected up front.
pub struct StubResolver;

impl ResourceResolver for StubResolver {
    fn validate(&self, resource_path: &str) -> Result<(), ResolutionError> {
        match resource_path {
            "authentication/methods" | "memberOf" => Ok(()),
            other => Err(ResolutionError::UnknownResource(other.to_string())),
        }
    }

    fn resolve(
        &self,
        resource_path: &str,
        identifier: &str,
    ) -> Result<RequestDescriptor, ResolutionError> {
        if identifier.starts_with("bad") {
            return Err(ResolutionError::InvalidIdentifier {
                identifier: identifier.to_string(),
                reason: "rejected by stub".to_string(),
            });
        }
        Ok(RequestDescriptor::get(format!(
            "/users/{identifier}/{resource_path}"
        )))
    }
}

/// Decides a step result given the step and how many times its identifier
/// has been submitted so far (1 on the first submission).
pub type StepScript = dyn Fn(&BatchStep, usize) -> Option<StepResult> + Send + Sync;

/// One recorded batch call.
#[derive(Debug, Clone)]
pub struct Call {
    pub identifiers: Vec<String>,
    pub started: Instant,
    pub finished: Instant,
}

/// Transport stub answering from a script and recording every call.
pub struct ScriptedTransport {
    script: Box<StepScript>,
    /// Overrides the whole call, by 1-based call number.
    call_script: Box<dyn Fn(usize) -> Option<TransportError> + Send + Sync>,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
    submissions: Mutex<HashMap<String, usize>>,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    /// Answers every step with a one-fragment payload.
    pub fn succeeding() -> Self {
        Self::with_script(|step, _| Some(payload_for(&step.identifier)))
    }

    pub fn with_script<F>(script: F) -> Self
    where
        F: Fn(&BatchStep, usize) -> Option<StepResult> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            call_script: Box::new(|_| None),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            submissions: Mutex::new(HashMap::new()),
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_calls<F>(mut self, call_script: F) -> Self
    where
        F: Fn(usize) -> Option<TransportError> + Send + Sync + 'static,
    {
        self.call_script = Box::new(call_script);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Number of times `identifier` was sent in a batch.
    pub fn submissions_of(&self, identifier: &str) -> usize {
        self.submissions.lock().get(identifier).copied().unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchTransport for ScriptedTransport {
    async fn submit_batch(&self, steps: &[BatchStep]) -> Result<BatchResponse, TransportError> {
        let started = Instant::now();
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let result = match (self.call_script)(call) {
            Some(err) => Err(err),
            None => {
                let mut response = BatchResponse::new();
                for step in steps {
                    let seen = {
                        let mut submissions = self.submissions.lock();
                        let count = submissions.entry(step.identifier.clone()).or_insert(0);
                        *count += 1;
                        *count
                    };
                    if let Some(result) = (self.script)(step, seen) {
                        response.insert(step.id, result);
                    }
                }
                Ok(response)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().push(Call {
            identifiers: steps.iter().map(|s| s.identifier.clone()).collect(),
            started,
            finished: Instant::now(),
        });
        result
    }
}

pub fn payload_for(identifier: &str) -> StepResult {
    StepResult::Payload(vec![json!({ "id": identifier, "methodType": "password" })])
}

pub fn rate_limited(millis: u64) -> StepResult {
    StepResult::RateLimited {
        retry_after: Some(Duration::from_millis(millis)),
    }
}

pub fn engine(config: FetchConfig, transport: Arc<ScriptedTransport>) -> FetchEngine {
    FetchEngine::new(config, Arc::new(StubResolver), transport)
}
