//! Error types for the Microsoft Graph collaborators.

use graphbulk_engine::TransportError;
use thiserror::Error;

/// Result type alias using `GraphError`.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur when talking to Microsoft Graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential file could not be read or parsed.
    #[error("Credential error: {0}")]
    Credentials(String),

    /// `OAuth2` authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Microsoft Graph API error.
    #[error("Graph API error: {code} - {message}")]
    GraphApi {
        status: u16,
        code: String,
        message: String,
        inner_error: Option<String>,
    },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded{}", retry_suffix(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Maximum retry attempts exceeded.
    #[error("Maximum retries ({attempts}) exceeded")]
    MaxRetriesExceeded { attempts: u32 },
}

fn retry_suffix(secs: &Option<u64>) -> String {
    secs.map(|s| format!(", retry after {s} seconds"))
        .unwrap_or_default()
}

impl GraphError {
    /// Returns true for errors caused by rejected credentials.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Returns true for network-level failures.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::MaxRetriesExceeded { .. })
    }
}

impl From<GraphError> for TransportError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Auth(detail) => TransportError::Auth(detail),
            GraphError::RateLimited { retry_after_secs } => TransportError::RateLimited {
                retry_after: retry_after_secs.map(std::time::Duration::from_secs),
            },
            other => TransportError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rate_limited_display() {
        let err = GraphError::RateLimited {
            retry_after_secs: Some(7),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded, retry after 7 seconds");
        let err = GraphError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn test_transport_error_mapping() {
        assert_eq!(
            TransportError::from(GraphError::Auth("invalid_client".into())),
            TransportError::Auth("invalid_client".into())
        );
        assert_eq!(
            TransportError::from(GraphError::RateLimited {
                retry_after_secs: Some(3)
            }),
            TransportError::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            }
        );
        assert!(matches!(
            TransportError::from(GraphError::GraphApi {
                status: 500,
                code: "InternalServerError".into(),
                message: "boom".into(),
                inner_error: None,
            }),
            TransportError::Transport(ref detail) if detail.contains("boom")
        ));
    }
}
