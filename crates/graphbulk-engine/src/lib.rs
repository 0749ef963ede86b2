//! Concurrent bulk resource-fetch engine.
//!
//! Given a large set of entity identifiers and a resource path, the engine
//! fetches one result per identifier from a remote directory API using
//! server-side request batching, a fixed pool of workers and a single
//! global backoff when the server starts rate limiting.
//!
//! The engine never speaks HTTP itself. It is driven by two collaborators:
//!
//! - a [`ResourceResolver`] that turns `(resource_path, identifier)` into a
//!   [`RequestDescriptor`];
//! - a [`BatchTransport`] that submits a batch of steps and reports one
//!   [`StepResult`] per step.
//!
//! Every identifier ends with exactly one terminal [`Outcome`]: a payload,
//! an empty result, or a failure. A fatal error aborts the run and returns
//! whatever was already resolved.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use graphbulk_engine::{BatchTransport, FetchConfig, FetchEngine, ResourceResolver};
//!
//! # async fn example(
//! #     resolver: Arc<dyn ResourceResolver>,
//! #     transport: Arc<dyn BatchTransport>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FetchEngine::new(FetchConfig::default().with_worker_count(8), resolver, transport);
//!
//! let ids = vec!["user-1".to_string(), "user-2".to_string()];
//! let report = engine.run(&ids, "authentication/methods").await?;
//! println!("{} identifiers resolved", report.completed());
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod completion;
mod config;
mod engine;
mod error;
mod governor;
mod metrics;
mod progress;
mod queue;
mod rate_limit;
mod transport;
mod types;
mod worker;

// Re-exports
pub use aggregator::{FetchReport, ResultAggregator};
pub use completion::CompletionTracker;
pub use config::{ConfigError, FetchConfig, StepErrorPolicy};
pub use engine::{CancelHandle, FetchAbort, FetchEngine};
pub use error::{FetchError, FetchResult, ResolutionError};
pub use governor::{GovernorState, RateGovernor};
pub use metrics::{FetchMetrics, FetchStats};
pub use progress::{ProgressHook, ProgressPhase, ProgressReporter, ProgressSnapshot};
pub use queue::WorkQueue;
pub use rate_limit::RateLimitConfig;
pub use transport::{
    BatchResponse, BatchStep, BatchTransport, HttpMethod, RequestDescriptor, ResourceResolver,
    StepResult, TransportError,
};
pub use types::{dedup_identifiers, partition, Batch, Outcome, Payload, ResultMap, StepId};
