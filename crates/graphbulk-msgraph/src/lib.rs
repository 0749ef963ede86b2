//! Microsoft Graph collaborators for the graphbulk engine.
//!
//! This crate supplies the pieces the engine treats as external when it
//! talks to Microsoft Graph:
//!
//! - `OAuth2` client credentials authentication with a token cache
//! - A paged Graph client (used to enumerate users)
//! - A [`BatchTransport`](graphbulk_engine::BatchTransport) over the
//!   `$batch` endpoint
//! - A static resource registry implementing
//!   [`ResourceResolver`](graphbulk_engine::ResourceResolver)
//! - Multi-cloud support (Commercial, US Government, China, Germany)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use graphbulk_engine::{FetchConfig, FetchEngine};
//! use graphbulk_msgraph::{
//!     GraphBatchTransport, GraphClient, GraphConfig, GraphCredentials, ResourceRegistry,
//!     TokenCache,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GraphConfig::builder().tenant_id("your-tenant-id").build()?;
//! let credentials = GraphCredentials::new("your-client-id", "your-client-secret");
//!
//! let tokens = Arc::new(TokenCache::new(credentials, &config)?);
//! tokens.authenticate().await?;
//!
//! let client = Arc::new(GraphClient::new(tokens, config)?);
//! let engine = FetchEngine::new(
//!     FetchConfig::default(),
//!     Arc::new(ResourceRegistry::new()),
//!     Arc::new(GraphBatchTransport::new(client)),
//! );
//! let report = engine
//!     .run(&["user-1".to_string()], "authentication/methods")
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod batch;
mod client;
mod config;
mod error;
mod resources;

// Re-exports
pub use auth::TokenCache;
pub use batch::{GraphBatchTransport, GRAPH_MAX_BATCH_SIZE};
pub use client::{GraphClient, ODataError, ODataErrorBody, ODataResponse};
pub use config::{
    CloudEnvironment, CredentialFile, GraphConfig, GraphConfigBuilder, GraphCredentials,
};
pub use error::{GraphError, GraphResult};
pub use resources::{validate_identifier, ResourceRegistry, ResourceSpec, RESOURCES};
