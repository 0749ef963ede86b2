//! Collaborator contracts: resource resolution and batch submission.
//!
//! The engine is payload-agnostic. It only knows how to ask a
//! [`ResourceResolver`] for a request per identifier and how to hand a set
//! of tagged requests to a [`BatchTransport`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::types::{Payload, StepId};
use crate::{FetchError, ResolutionError};

/// HTTP method of a request descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An executable request for one identifier's resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// URL relative to the API version root (e.g. `/users/{id}/memberOf`).
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl RequestDescriptor {
    /// Creates a GET request with no extra headers.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// One tagged request inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStep {
    pub id: StepId,
    pub identifier: String,
    pub request: RequestDescriptor,
}

/// Per-step result reported by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// Payload fragments for the step, in response order.
    Payload(Vec<Payload>),
    /// The resource does not exist.
    NotFound,
    /// The server asked us to slow down.
    RateLimited { retry_after: Option<Duration> },
    /// Any other error status.
    Failed { status: Option<u16>, detail: String },
}

/// Step results keyed by step tag.
pub type BatchResponse = HashMap<StepId, StepResult>;

/// Failure of the batch call as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Credentials were rejected. Never retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The batch endpoint itself is rate limited.
    #[error("Batch endpoint rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Network, server or protocol failure.
    #[error("Batch request failed: {0}")]
    Transport(String),
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Auth(detail) => FetchError::Auth(detail),
            TransportError::Transport(detail) => FetchError::Transport(detail),
            TransportError::RateLimited { .. } => {
                FetchError::Transport("batch endpoint rate limited".to_string())
            }
        }
    }
}

/// Maps a resource path and identifier to a request.
///
/// Implementations must be pure and cheap; they run on worker tasks.
pub trait ResourceResolver: Send + Sync {
    /// Checks that the resource path is supported before any work starts.
    fn validate(&self, resource_path: &str) -> Result<(), ResolutionError> {
        let _ = resource_path;
        Ok(())
    }

    /// Builds the request for one identifier.
    fn resolve(
        &self,
        resource_path: &str,
        identifier: &str,
    ) -> Result<RequestDescriptor, ResolutionError>;
}

/// Submits batches of tagged requests.
///
/// Shared by every worker, so implementations must be safe for concurrent use.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// Sends all steps as a single batch call.
    ///
    /// Returns one result per step that the server answered. Steps missing
    /// from the response are treated as not yet observed and retried.
    async fn submit_batch(&self, steps: &[BatchStep]) -> Result<BatchResponse, TransportError>;
}
