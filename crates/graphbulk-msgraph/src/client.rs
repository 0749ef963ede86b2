//! Microsoft Graph API HTTP client with pagination and retry handling.

use graphbulk_engine::RateLimitConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::{GraphConfig, GraphError, GraphResult, TokenCache};

/// `OData` error response from Microsoft Graph.
#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub error: ODataErrorBody,
}

/// `OData` error body.
#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    pub code: String,
    pub message: String,
    #[serde(rename = "innerError")]
    pub inner_error: Option<serde_json::Value>,
}

/// Response wrapper for paginated Graph API responses.
#[derive(Debug, Deserialize)]
pub struct ODataResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Builds a [`GraphError`] from a non-success status and its body.
pub(crate) fn api_error(status: reqwest::StatusCode, body: &str) -> GraphError {
    match serde_json::from_str::<ODataError>(body) {
        Ok(odata) => GraphError::GraphApi {
            status: status.as_u16(),
            code: odata.error.code,
            message: odata.error.message,
            inner_error: odata.error.inner_error.map(|v| v.to_string()),
        },
        Err(_) => GraphError::GraphApi {
            status: status.as_u16(),
            code: status.to_string(),
            message: body.to_string(),
            inner_error: None,
        },
    }
}

fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(RateLimitConfig::parse_retry_after)
        .map(|d| d.as_secs())
}

/// Microsoft Graph API client.
#[derive(Debug)]
pub struct GraphClient {
    http_client: reqwest::Client,
    token_cache: Arc<TokenCache>,
    config: GraphConfig,
    retry: RateLimitConfig,
}

impl GraphClient {
    /// Creates a new Graph client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token_cache: Arc<TokenCache>, config: GraphConfig) -> GraphResult<Self> {
        Self::with_retry_config(token_cache, config, RateLimitConfig::default())
    }

    /// Creates a new Graph client with custom retry settings for direct
    /// (non-batch) requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the retry
    /// config is invalid.
    pub fn with_retry_config(
        token_cache: Arc<TokenCache>,
        config: GraphConfig,
        retry: RateLimitConfig,
    ) -> GraphResult<Self> {
        retry
            .validate()
            .map_err(|e| GraphError::Config(format!("Invalid retry config: {e}")))?;

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GraphError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            token_cache,
            config,
            retry,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Returns the base URL for Graph API requests.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    /// Performs a GET request with token injection and retry handling.
    ///
    /// Throttling (429) and transient gateway errors (502, 503, 504) are
    /// retried up to `max_retries` times.
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> GraphResult<T> {
        let mut attempt = 0u32;

        loop {
            let token = self.token_cache.get_token().await?;
            let response = self
                .http_client
                .get(url)
                .bearer_auth(&token)
                .send()
                .await?;
            let status = response.status();

            if status.is_success() {
                return response.json().await.map_err(GraphError::from);
            }

            let retryable = status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || matches!(
                    status,
                    reqwest::StatusCode::BAD_GATEWAY
                        | reqwest::StatusCode::SERVICE_UNAVAILABLE
                        | reqwest::StatusCode::GATEWAY_TIMEOUT
                );

            if retryable {
                if attempt >= self.retry.max_retries {
                    return Err(GraphError::MaxRetriesExceeded { attempts: attempt });
                }
                let server_delay =
                    retry_after_secs(response.headers()).map(std::time::Duration::from_secs);
                let delay = self.retry.pause_duration(server_delay, attempt);
                attempt += 1;
                warn!(
                    "Request returned {}, retry {}/{} after {:?}",
                    status, attempt, self.retry.max_retries, delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.token_cache.invalidate().await;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
    }

    /// Fetches all pages of a paginated response, processing each page via callback.
    ///
    /// Returns the number of pages fetched.
    #[instrument(skip(self, callback))]
    pub async fn get_paginated<T, F>(
        &self,
        initial_url: &str,
        mut callback: F,
    ) -> GraphResult<usize>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>) -> GraphResult<()>,
    {
        let mut url = initial_url.to_string();
        let mut pages = 0;

        loop {
            debug!("Fetching page: {}", url);
            let response: ODataResponse<T> = self.get(&url).await?;
            pages += 1;

            callback(response.value)?;

            match response.next_link {
                Some(next) => url = next,
                None => return Ok(pages),
            }
        }
    }

    /// Enumerates every user in the tenant as raw JSON objects.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> GraphResult<Vec<serde_json::Value>> {
        let mut users = Vec::new();
        let url = format!("{}/users", self.base_url());
        let pages = self
            .get_paginated(&url, |page: Vec<serde_json::Value>| {
                users.extend(page);
                Ok(())
            })
            .await?;
        debug!("Fetched {} users in {} pages", users.len(), pages);
        Ok(users)
    }

    /// Sends one JSON `$batch` request without retrying.
    ///
    /// 401 and 403 on the envelope map to [`GraphError::Auth`], 429 to
    /// [`GraphError::RateLimited`]. Retrying is left to the caller.
    #[instrument(skip(self, body))]
    pub async fn post_batch<B, T>(&self, body: &B) -> GraphResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/$batch", self.base_url());
        let token = self.token_cache.get_token().await?;

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(GraphError::from);
        }

        match status {
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(GraphError::RateLimited {
                retry_after_secs: retry_after_secs(response.headers()),
            }),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                self.token_cache.invalidate().await;
                let body = response.text().await.unwrap_or_default();
                Err(GraphError::Auth(api_error(status, &body).to_string()))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(api_error(status, &body))
            }
        }
    }
}
