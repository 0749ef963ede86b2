//! `$batch` transport.
//!
//! Packs the engine's steps into one JSON batch request and maps every
//! per-request response back to a [`StepResult`].

use async_trait::async_trait;
use graphbulk_engine::{
    BatchResponse, BatchStep, BatchTransport, Payload, RateLimitConfig, StepId, StepResult,
    TransportError,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::client::api_error;
use crate::GraphClient;

/// Most requests Graph accepts in one `$batch` call.
pub const GRAPH_MAX_BATCH_SIZE: usize = 20;

#[derive(Debug, Serialize)]
struct BatchRequestBody<'a> {
    requests: Vec<BatchRequestItem<'a>>,
}

#[derive(Debug, Serialize)]
struct BatchRequestItem<'a> {
    id: String,
    method: &'static str,
    url: &'a str,
    #[serde(skip_serializing_if = "no_headers")]
    headers: &'a BTreeMap<String, String>,
}

fn no_headers(headers: &&BTreeMap<String, String>) -> bool {
    headers.is_empty()
}

#[derive(Debug, Deserialize)]
struct BatchResponseBody {
    #[serde(default)]
    responses: Vec<BatchResponseItem>,
}

#[derive(Debug, Deserialize)]
struct BatchResponseItem {
    id: String,
    status: u16,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

impl BatchResponseItem {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn into_step_result(self) -> StepResult {
        match self.status {
            200..=299 => StepResult::Payload(payload_fragments(self.body)),
            404 => StepResult::NotFound,
            429 => StepResult::RateLimited {
                retry_after: self
                    .header("Retry-After")
                    .and_then(RateLimitConfig::parse_retry_after),
            },
            status => {
                let detail = match self.body {
                    Some(body) => {
                        let status_code = reqwest::StatusCode::from_u16(status)
                            .unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
                        api_error(status_code, &body.to_string()).to_string()
                    }
                    None => format!("status {status}"),
                };
                StepResult::Failed {
                    status: Some(status),
                    detail,
                }
            }
        }
    }
}

/// Splits a successful step body into payload fragments.
///
/// Collections yield their `value` items (first page only); any other body
/// is a single fragment.
fn payload_fragments(body: Option<serde_json::Value>) -> Vec<Payload> {
    match body {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Object(mut map)) => {
            if map.contains_key("@odata.nextLink") {
                debug!("Step response has more pages; keeping the first");
            }
            match map.remove("value") {
                Some(serde_json::Value::Array(items)) => items,
                Some(other) => {
                    map.insert("value".to_string(), other);
                    vec![serde_json::Value::Object(map)]
                }
                None => vec![serde_json::Value::Object(map)],
            }
        }
        Some(other) => vec![other],
    }
}

/// [`BatchTransport`] over Microsoft Graph's JSON batching endpoint.
#[derive(Debug, Clone)]
pub struct GraphBatchTransport {
    client: Arc<GraphClient>,
}

impl GraphBatchTransport {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BatchTransport for GraphBatchTransport {
    #[instrument(skip(self, steps), fields(steps = steps.len()))]
    async fn submit_batch(&self, steps: &[BatchStep]) -> Result<BatchResponse, TransportError> {
        if steps.len() > GRAPH_MAX_BATCH_SIZE {
            return Err(TransportError::Transport(format!(
                "batch of {} exceeds the Graph limit of {}",
                steps.len(),
                GRAPH_MAX_BATCH_SIZE
            )));
        }

        let body = BatchRequestBody {
            requests: steps
                .iter()
                .map(|step| BatchRequestItem {
                    id: step.id.to_string(),
                    method: step.request.method.as_str(),
                    url: &step.request.url,
                    headers: &step.request.headers,
                })
                .collect(),
        };

        let envelope: BatchResponseBody = self.client.post_batch(&body).await?;

        let mut responses = BatchResponse::with_capacity(envelope.responses.len());
        for item in envelope.responses {
            match item.id.parse::<StepId>() {
                Ok(id) => {
                    responses.insert(id, item.into_step_result());
                }
                Err(_) => warn!("Ignoring batch response with invalid id '{}'", item.id),
            }
        }
        Ok(responses)
    }
}
