//! Credential resolution and Graph connection setup.

use graphbulk_msgraph::{
    CloudEnvironment, CredentialFile, GraphClient, GraphConfig, GraphCredentials, TokenCache,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::cli::GraphArgs;
use crate::error::{CliError, CliResult};

/// Credentials and tenant settings ready for authentication.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub credentials: GraphCredentials,
    pub config: GraphConfig,
}

/// Resolves credentials from the global flags.
///
/// A credential file wins over individual flags.
pub fn resolve(args: &GraphArgs) -> CliResult<ResolvedCredentials> {
    if let Some(path) = &args.credentials {
        return from_file(path, args);
    }

    match (&args.client_id, &args.client_secret, &args.tenant_id) {
        (Some(client_id), Some(client_secret), Some(tenant_id)) => {
            from_parts(client_id, client_secret, tenant_id, args)
        }
        (None, None, None) => Err(CliError::MissingCredentials),
        _ => Err(CliError::Validation(
            "--client-id, --client-secret and --tenant-id must be given together".to_string(),
        )),
    }
}

/// Resolves a credential file path.
pub fn from_file(path: &Path, args: &GraphArgs) -> CliResult<ResolvedCredentials> {
    debug!("Reading credentials from {}", path.display());
    let file = CredentialFile::load(path)?;
    Ok(ResolvedCredentials {
        config: build_config(&file.tenant_id, args)?,
        credentials: file.credentials,
    })
}

/// Resolves explicit client id, secret and tenant.
pub fn from_parts(
    client_id: &str,
    client_secret: &str,
    tenant_id: &str,
    args: &GraphArgs,
) -> CliResult<ResolvedCredentials> {
    if client_id.trim().is_empty() {
        return Err(CliError::Validation("client id must not be empty".to_string()));
    }
    Ok(ResolvedCredentials {
        credentials: GraphCredentials::new(client_id, client_secret),
        config: build_config(tenant_id, args)?,
    })
}

fn build_config(tenant_id: &str, args: &GraphArgs) -> CliResult<GraphConfig> {
    let cloud: CloudEnvironment = args.cloud.parse()?;
    let mut builder = GraphConfig::builder().tenant_id(tenant_id).cloud(cloud);
    if let Some(url) = &args.login_endpoint {
        builder = builder.login_endpoint(url.clone());
    }
    if let Some(url) = &args.graph_endpoint {
        builder = builder.graph_endpoint(url.clone());
    }
    Ok(builder.build()?)
}

/// An authenticated Graph connection.
pub struct GraphSession {
    pub tokens: Arc<TokenCache>,
    pub client: Arc<GraphClient>,
}

impl GraphSession {
    /// Acquires a token and builds a client; fails before any fetch work if
    /// the credentials are rejected.
    pub async fn connect(resolved: ResolvedCredentials) -> CliResult<Self> {
        let tokens = Arc::new(TokenCache::new(resolved.credentials, &resolved.config)?);
        tokens.authenticate().await?;
        let client = Arc::new(GraphClient::new(Arc::clone(&tokens), resolved.config)?);
        Ok(Self { tokens, client })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args() -> GraphArgs {
        GraphArgs {
            cloud: "commercial".to_string(),
            ..GraphArgs::default()
        }
    }

    #[test]
    fn test_missing_credentials() {
        assert!(matches!(resolve(&args()), Err(CliError::MissingCredentials)));
    }

    #[test]
    fn test_partial_flags_rejected() {
        let args = GraphArgs {
            client_id: Some("app".to_string()),
            ..args()
        };
        assert!(matches!(resolve(&args), Err(CliError::Validation(_))));
    }

    #[test]
    fn test_flags_resolve() {
        let args = GraphArgs {
            client_id: Some("app".to_string()),
            client_secret: Some("secret".to_string()),
            tenant_id: Some("contoso".to_string()),
            cloud: "usgov".to_string(),
            ..GraphArgs::default()
        };
        let resolved = resolve(&args).unwrap();
        assert_eq!(resolved.credentials.client_id, "app");
        assert_eq!(resolved.config.tenant_id, "contoso");
        assert_eq!(resolved.config.cloud, CloudEnvironment::UsGovernment);
    }

    #[test]
    fn test_file_wins_over_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"clientId": "file-app", "clientSecret": "s", "tenantId": "file-tenant"}}"#
        )
        .unwrap();

        let args = GraphArgs {
            credentials: Some(file.path().to_path_buf()),
            client_id: Some("flag-app".to_string()),
            ..args()
        };
        let resolved = resolve(&args).unwrap();
        assert_eq!(resolved.credentials.client_id, "file-app");
        assert_eq!(resolved.config.tenant_id, "file-tenant");
    }

    #[test]
    fn test_unknown_cloud() {
        let args = GraphArgs {
            cloud: "mars".to_string(),
            ..args()
        };
        let err = from_parts("app", "secret", "tenant", &args).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
