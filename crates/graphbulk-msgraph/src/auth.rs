//! OAuth2 client credentials authentication for Microsoft Graph.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::{GraphConfig, GraphCredentials, GraphError, GraphResult};

/// OAuth2 token response from Azure AD.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: String,
}

/// Cached OAuth2 access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Returns true if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Token cache for app-only Graph access tokens.
///
/// Shared by every worker; concurrent callers read the cached token and
/// only refresh it when it is within the grace period of expiring.
#[derive(Debug)]
pub struct TokenCache {
    credentials: GraphCredentials,
    token_url: String,
    scope: String,
    tenant_id: String,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// Grace period before expiry to trigger refresh (default: 5 minutes).
    grace_period: Duration,
}

impl TokenCache {
    /// Creates a new token cache for the tenant in `config`.
    pub fn new(credentials: GraphCredentials, config: &GraphConfig) -> GraphResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GraphError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            credentials,
            token_url: config.token_url(),
            scope: config.scope(),
            tenant_id: config.tenant_id.clone(),
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
            grace_period: Duration::minutes(5),
        })
    }

    /// Acquires a token once to check the credentials.
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    pub async fn authenticate(&self) -> GraphResult<()> {
        self.get_token().await?;
        info!("Graph API authenticated");
        Ok(())
    }

    /// Gets a valid access token, refreshing if necessary.
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    pub async fn get_token(&self) -> GraphResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    debug!("Using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cache = self.cached_token.write().await;
        // Another worker may have refreshed while we waited for the lock
        if let Some(ref token) = *cache {
            if !token.is_expired(self.grace_period) {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing access token");
        let new_token = self.acquire_token().await?;
        let access_token = new_token.access_token.clone();
        *cache = Some(new_token);

        Ok(access_token)
    }

    /// Acquires a new access token using client credentials flow.
    #[instrument(skip(self))]
    async fn acquire_token(&self) -> GraphResult<CachedToken> {
        use secrecy::ExposeSecret;

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            (
                "client_secret",
                self.credentials.client_secret.expose_secret().as_str(),
            ),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| GraphError::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Auth(format!("Failed to parse token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);

        debug!(
            "Acquired new token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    /// Invalidates the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}
