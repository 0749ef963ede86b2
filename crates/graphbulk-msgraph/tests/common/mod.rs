//! Common test utilities for graphbulk-msgraph integration tests.

#![allow(dead_code)]

use graphbulk_engine::RateLimitConfig;
use graphbulk_msgraph::{GraphClient, GraphConfig, GraphCredentials, TokenCache};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TENANT: &str = "test-tenant";

/// Test data factory for creating Graph users.
pub fn create_test_user(id: &str, email_prefix: &str) -> Value {
    json!({
        "id": id,
        "userPrincipalName": format!("{}@test.onmicrosoft.com", email_prefix),
        "displayName": format!("Test User {}", email_prefix),
        "accountEnabled": true
    })
}

/// Test data factory for an authentication method.
pub fn create_auth_method(id: &str, odata_type: &str) -> Value {
    json!({
        "@odata.type": odata_type,
        "id": id
    })
}

/// Wraps items in an OData response format.
pub fn create_odata_response(items: Vec<Value>, next_link: Option<&str>) -> Value {
    let mut response = json!({ "value": items });
    if let Some(link) = next_link {
        response["@odata.nextLink"] = json!(link);
    }
    response
}

/// Creates an OData error response.
pub fn create_odata_error(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Creates a mock OAuth token response.
pub fn create_token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Generate a sequence of test users.
pub fn generate_test_users(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| create_test_user(&format!("user-{}", i), &format!("user{}", i)))
        .collect()
}

/// Extracts the user id from a batch request URL `/users/{id}/...`.
pub fn user_of(request: &Value) -> String {
    request["url"]
        .as_str()
        .and_then(|url| url.trim_start_matches('/').split('/').nth(1))
        .unwrap_or_default()
        .to_string()
}

/// One sub-response of a `$batch` reply.
pub fn batch_item(id: &Value, status: u16, body: Value) -> Value {
    json!({ "id": id, "status": status, "headers": {}, "body": body })
}

/// Answers `$batch` calls by mapping each sub-request to a sub-response.
///
/// The script receives the sub-request and the 1-based number of the
/// `$batch` call it arrived in.
pub struct BatchResponder<F> {
    script: F,
    calls: Arc<AtomicUsize>,
}

impl<F> BatchResponder<F>
where
    F: Fn(&Value, usize) -> Value + Send + Sync + 'static,
{
    pub fn new(script: F) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                script,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl<F> Respond for BatchResponder<F>
where
    F: Fn(&Value, usize) -> Value + Send + Sync + 'static,
{
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let responses: Vec<Value> = body["requests"]
            .as_array()
            .map(|requests| requests.iter().map(|r| (self.script)(r, call)).collect())
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({ "responses": responses }))
    }
}

/// Mock server wrapper with common setup helpers.
pub struct MockGraphServer {
    pub server: MockServer,
}

impl MockGraphServer {
    /// Creates a new mock Graph API server.
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Returns the mock server's base URL.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Configuration pointing both login and Graph at the mock server.
    pub fn config(&self) -> GraphConfig {
        GraphConfig::builder()
            .tenant_id(TENANT)
            .login_endpoint(self.url())
            .graph_endpoint(self.url())
            .build()
            .expect("mock config is valid")
    }

    pub fn token_cache(&self) -> Arc<TokenCache> {
        Arc::new(
            TokenCache::new(
                GraphCredentials::new("test-client", "test-secret"),
                &self.config(),
            )
            .expect("token cache builds"),
        )
    }

    /// Client with short retry delays.
    pub fn client(&self) -> Arc<GraphClient> {
        Arc::new(
            GraphClient::with_retry_config(
                self.token_cache(),
                self.config(),
                RateLimitConfig::for_testing(),
            )
            .expect("client builds"),
        )
    }

    /// Sets up OAuth token endpoint.
    pub async fn mock_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/oauth2/v2.0/token", TENANT)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(create_token_response("mock-access-token", 3600)),
            )
            .mount(&self.server)
            .await;
    }

    /// Sets up a token endpoint that rejects the client secret.
    pub async fn mock_token_rejected(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/oauth2/v2.0/token", TENANT)))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided."
            })))
            .mount(&self.server)
            .await;
    }

    /// Sets up users list endpoint with pagination.
    pub async fn mock_users_endpoint(&self, users: Vec<Value>, page_size: usize) {
        let pages: Vec<Vec<Value>> = users.chunks(page_size).map(|c| c.to_vec()).collect();
        let total_pages = pages.len();

        for (i, page) in pages.into_iter().enumerate() {
            let next_link = (i < total_pages - 1)
                .then(|| format!("{}/v1.0/users/page{}", self.url(), i + 1));
            let response = create_odata_response(page, next_link.as_deref());
            let page_path = if i == 0 {
                "/v1.0/users".to_string()
            } else {
                format!("/v1.0/users/page{}", i)
            };

            Mock::given(method("GET"))
                .and(path(page_path))
                .respond_with(ResponseTemplate::new(200).set_body_json(response))
                .mount(&self.server)
                .await;
        }
    }

    /// Mounts a `$batch` responder and returns its call counter.
    pub async fn mock_batch<F>(&self, script: F) -> Arc<AtomicUsize>
    where
        F: Fn(&Value, usize) -> Value + Send + Sync + 'static,
    {
        let (responder, calls) = BatchResponder::new(script);
        Mock::given(method("POST"))
            .and(path("/v1.0/$batch"))
            .respond_with(responder)
            .mount(&self.server)
            .await;
        calls
    }
}
