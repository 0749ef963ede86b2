//! `auth`: check app credentials against the tenant.

use clap::Args;
use std::path::Path;

use crate::cli::GraphArgs;
use crate::credentials::{self, GraphSession, ResolvedCredentials};
use crate::error::{CliError, CliResult};
use crate::output::{print_key_value, print_success};

/// Arguments for the auth command
#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Either a credential file, or client id, client secret and tenant id.
    /// Falls back to the global credential flags when omitted.
    #[arg(num_args = 0..=3, value_name = "CREDENTIALS")]
    pub values: Vec<String>,
}

impl AuthArgs {
    fn resolve(&self, graph: &GraphArgs) -> CliResult<ResolvedCredentials> {
        match self.values.as_slice() {
            [] => credentials::resolve(graph),
            [file] => credentials::from_file(Path::new(file), graph),
            [client_id, client_secret, tenant_id] => {
                credentials::from_parts(client_id, client_secret, tenant_id, graph)
            }
            _ => Err(CliError::Validation(
                "expected a credential file, or client id, client secret and tenant id"
                    .to_string(),
            )),
        }
    }
}

pub async fn execute(args: AuthArgs, graph: &GraphArgs) -> CliResult<()> {
    let resolved = args.resolve(graph)?;
    let tenant = resolved.config.tenant_id.clone();
    let cloud = resolved.config.cloud;

    GraphSession::connect(resolved).await?;

    print_success("Graph API authenticated");
    print_key_value("Tenant", &tenant);
    print_key_value("Cloud", &cloud.to_string());
    Ok(())
}
