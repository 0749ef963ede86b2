//! Tenant, cloud and credential configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::{GraphError, GraphResult};

/// Azure national cloud hosting the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudEnvironment {
    #[default]
    Commercial,
    UsGovernment,
    China,
    Germany,
}

impl CloudEnvironment {
    /// Azure AD login endpoint, without trailing slash.
    pub fn login_endpoint(&self) -> &'static str {
        match self {
            Self::Commercial => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
            Self::Germany => "https://login.microsoftonline.de",
        }
    }

    /// Microsoft Graph endpoint, without trailing slash.
    pub fn graph_endpoint(&self) -> &'static str {
        match self {
            Self::Commercial => "https://graph.microsoft.com",
            Self::UsGovernment => "https://graph.microsoft.us",
            Self::China => "https://microsoftgraph.chinacloudapi.cn",
            Self::Germany => "https://graph.microsoft.de",
        }
    }
}

impl fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Commercial => "commercial",
            Self::UsGovernment => "us_government",
            Self::China => "china",
            Self::Germany => "germany",
        };
        f.write_str(name)
    }
}

impl FromStr for CloudEnvironment {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "commercial" | "global" => Ok(Self::Commercial),
            "us_government" | "usgov" | "gcc_high" => Ok(Self::UsGovernment),
            "china" => Ok(Self::China),
            "germany" => Ok(Self::Germany),
            other => Err(GraphError::Config(format!("Unknown cloud environment: {other}"))),
        }
    }
}

/// App registration credentials for the client credentials flow.
#[derive(Debug, Clone)]
pub struct GraphCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl GraphCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCredentialFile {
    client_id: String,
    client_secret: String,
    tenant_id: String,
}

/// Contents of a credential file:
/// `{"clientId": "...", "clientSecret": "...", "tenantId": "..."}`.
#[derive(Debug, Clone)]
pub struct CredentialFile {
    pub credentials: GraphCredentials,
    pub tenant_id: String,
}

impl CredentialFile {
    /// Reads and parses a credential file.
    pub fn load(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GraphError::Credentials(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> GraphResult<Self> {
        let raw: RawCredentialFile = serde_json::from_str(contents)
            .map_err(|e| GraphError::Credentials(format!("Invalid credential file: {e}")))?;

        if raw.client_id.trim().is_empty() || raw.tenant_id.trim().is_empty() {
            return Err(GraphError::Credentials(
                "clientId and tenantId must not be empty".to_string(),
            ));
        }

        Ok(Self {
            credentials: GraphCredentials::new(raw.client_id, raw.client_secret),
            tenant_id: raw.tenant_id,
        })
    }
}

/// Connection settings for one tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub cloud: CloudEnvironment,
    /// Graph API version segment (default: `v1.0`).
    pub api_version: String,
    /// Timeout applied to every HTTP request (default: 30s).
    pub request_timeout: Duration,
    login_endpoint: Option<String>,
    graph_endpoint: Option<String>,
}

impl GraphConfig {
    #[must_use]
    pub fn builder() -> GraphConfigBuilder {
        GraphConfigBuilder::default()
    }

    /// Login endpoint, honouring any override.
    pub fn login_endpoint(&self) -> &str {
        self.login_endpoint
            .as_deref()
            .unwrap_or_else(|| self.cloud.login_endpoint())
    }

    /// Graph endpoint, honouring any override.
    pub fn graph_endpoint(&self) -> &str {
        self.graph_endpoint
            .as_deref()
            .unwrap_or_else(|| self.cloud.graph_endpoint())
    }

    /// `{graph}/{version}`, the root every request URL is relative to.
    pub fn base_url(&self) -> String {
        format!("{}/{}", self.graph_endpoint(), self.api_version)
    }

    pub fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.login_endpoint(), self.tenant_id)
    }

    /// `OAuth2` scope for app-only access to Graph.
    pub fn scope(&self) -> String {
        format!("{}/.default", self.cloud.graph_endpoint())
    }
}

/// Builder for [`GraphConfig`].
#[derive(Debug, Clone, Default)]
pub struct GraphConfigBuilder {
    tenant_id: Option<String>,
    cloud: CloudEnvironment,
    api_version: Option<String>,
    request_timeout: Option<Duration>,
    login_endpoint: Option<String>,
    graph_endpoint: Option<String>,
}

impl GraphConfigBuilder {
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn cloud(mut self, cloud: CloudEnvironment) -> Self {
        self.cloud = cloud;
        self
    }

    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Overrides the login endpoint (mock servers, sovereign proxies).
    #[must_use]
    pub fn login_endpoint(mut self, url: impl Into<String>) -> Self {
        self.login_endpoint = Some(url.into());
        self
    }

    /// Overrides the Graph endpoint.
    #[must_use]
    pub fn graph_endpoint(mut self, url: impl Into<String>) -> Self {
        self.graph_endpoint = Some(url.into());
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> GraphResult<GraphConfig> {
        let tenant_id = self
            .tenant_id
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GraphError::Config("tenant_id is required".to_string()))?;
        if tenant_id.contains(['/', '?', '#']) {
            return Err(GraphError::Config(format!("Invalid tenant_id: {tenant_id}")));
        }

        let api_version = self.api_version.unwrap_or_else(|| "v1.0".to_string());
        if !matches!(api_version.as_str(), "v1.0" | "beta") {
            return Err(GraphError::Config(format!(
                "Unsupported API version: {api_version}"
            )));
        }

        let request_timeout = self.request_timeout.unwrap_or(Duration::from_secs(30));
        if request_timeout.is_zero() {
            return Err(GraphError::Config(
                "request_timeout must be > 0".to_string(),
            ));
        }

        Ok(GraphConfig {
            tenant_id,
            cloud: self.cloud,
            api_version,
            request_timeout,
            login_endpoint: self.login_endpoint.map(normalize_endpoint).transpose()?,
            graph_endpoint: self.graph_endpoint.map(normalize_endpoint).transpose()?,
        })
    }
}

fn normalize_endpoint(raw: String) -> GraphResult<String> {
    let parsed = url::Url::parse(&raw)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GraphError::Config(format!(
            "Unsupported scheme: {}",
            parsed.scheme()
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
