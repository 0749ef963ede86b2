//! CLI error types and exit codes

use graphbulk_engine::{ConfigError, FetchAbort, FetchError};
use graphbulk_msgraph::GraphError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General or I/O error
/// - 2: Authentication error
/// - 3: Network error
/// - 4: Validation error
/// - 5: Fetch aborted, partial results written
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No credentials supplied")]
    MissingCredentials,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Fetch stopped after {completed} of {total} identifiers: {reason}")]
    Partial {
        completed: usize,
        total: usize,
        reason: String,
    },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::AuthenticationFailed(_) | CliError::MissingCredentials => 2,
            CliError::Network(_) => 3,
            CliError::Validation(_) => 4,
            CliError::Api { status, .. } => {
                if *status == 401 || *status == 403 {
                    2
                } else if *status >= 500 {
                    3
                } else {
                    4
                }
            }
            CliError::Partial { .. } => 5,
            CliError::Io(_) | CliError::Config(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::MissingCredentials => Some(
                "Pass --credentials FILE, or --client-id, --client-secret and --tenant-id.",
            ),
            CliError::AuthenticationFailed(_) => {
                Some("Check the app registration's secret and its Graph API permissions.")
            }
            CliError::Partial { .. } => {
                Some("Results fetched before the stop were written to the output file.")
            }
            _ => None,
        }
    }
}

impl From<GraphError> for CliError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Auth(msg) => CliError::AuthenticationFailed(msg),
            GraphError::Credentials(msg) => CliError::Config(msg),
            GraphError::Config(msg) => CliError::Validation(msg),
            GraphError::GraphApi {
                status,
                code,
                message,
                ..
            } => CliError::Api {
                status,
                message: format!("{code} - {message}"),
            },
            other => CliError::Network(other.to_string()),
        }
    }
}

impl From<FetchAbort> for CliError {
    fn from(abort: FetchAbort) -> Self {
        CliError::Partial {
            completed: abort.partial.completed(),
            total: abort.partial.total(),
            reason: abort.error.to_string(),
        }
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Config(msg) => CliError::Validation(msg),
            FetchError::Resolution(err) => CliError::Validation(err.to_string()),
            FetchError::Auth(msg) => CliError::AuthenticationFailed(msg),
            FetchError::Transport(msg) => CliError::Network(msg),
            other => CliError::Config(other.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Validation(format!("JSON error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphbulk_engine::FetchReport;

    #[test]
    fn test_exit_code_auth() {
        assert_eq!(CliError::MissingCredentials.exit_code(), 2);
        assert_eq!(
            CliError::AuthenticationFailed("bad secret".to_string()).exit_code(),
            2
        );
    }

    #[test]
    fn test_exit_code_network_error() {
        assert_eq!(CliError::Network("test".to_string()).exit_code(), 3);
    }

    #[test]
    fn test_exit_code_validation_error() {
        assert_eq!(CliError::Validation("test".to_string()).exit_code(), 4);
    }

    #[test]
    fn test_exit_code_api_error_403() {
        assert_eq!(
            CliError::Api {
                status: 403,
                message: "test".to_string()
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_graph_auth_error_maps_to_auth_exit() {
        let err: CliError = GraphError::Auth("invalid_client".to_string()).into();
        assert!(matches!(err, CliError::AuthenticationFailed(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_abort_maps_to_partial() {
        let mut partial = FetchReport::default();
        partial.empty.insert("u-1".to_string());
        partial.unresolved.push("u-2".to_string());

        let err: CliError = FetchAbort {
            error: FetchError::Cancelled,
            partial,
        }
        .into();

        assert_eq!(err.exit_code(), 5);
        assert_eq!(
            err.to_string(),
            "Fetch stopped after 1 of 2 identifiers: Fetch cancelled"
        );
    }
}
