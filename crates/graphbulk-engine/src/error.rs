//! Error types for the bulk fetch engine.

use thiserror::Error;

/// Result type alias using `FetchError`.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can end a fetch run or reject an engine operation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The resource path was rejected before any request was sent.
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// The transport rejected our credentials.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The batch call itself failed (network, server, protocol).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single step failed with a status that is neither "not found" nor
    /// a rate limit.
    #[error("Request for '{identifier}' failed{}: {detail}", status_suffix(.status))]
    StepFailed {
        identifier: String,
        status: Option<u16>,
        detail: String,
    },

    /// Work queue is full.
    #[error("Work queue full ({queue_depth} batches pending)")]
    QueueFull { queue_depth: usize },

    /// Work queue was closed before the batch could be pushed.
    #[error("Work queue closed")]
    QueueClosed,

    /// An outcome was recorded twice for the same identifier.
    #[error("Identifier '{0}' already has a terminal outcome")]
    AlreadyTerminal(String),

    /// An outcome was recorded for an identifier outside the run.
    #[error("Identifier '{0}' is not part of this run")]
    UnknownIdentifier(String),

    /// More completions were signalled than there are identifiers.
    #[error("Completion count exceeded total of {total}")]
    CompletionOverflow { total: usize },

    /// A worker task panicked or was cancelled by the runtime.
    #[error("Worker task failed: {0}")]
    Worker(String),

    /// The caller requested a stop.
    #[error("Fetch cancelled")]
    Cancelled,

    /// All workers stopped while identifiers were still pending.
    #[error("Run ended with {done} of {total} identifiers resolved")]
    Incomplete { done: usize, total: usize },
}

/// Errors raised by a resource resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The resource path has no registered request builder.
    #[error("Unknown resource path: {0}")]
    UnknownResource(String),

    /// The identifier cannot be placed into a request.
    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

impl FetchError {
    /// Returns true if the error was caused by the caller stopping the run.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
