//! Command-line definition.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{auth::AuthArgs, get::GetArgs, resources::ResourcesArgs};

/// graphbulk - bulk Microsoft Graph exports
#[derive(Debug, Parser)]
#[command(name = "graphbulk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info,graphbulk_engine=info,graphbulk_msgraph=info",
            2 => "info,graphbulk_engine=debug,graphbulk_msgraph=debug,graphbulk_cli=debug",
            _ => "debug,graphbulk_engine=trace,graphbulk_msgraph=trace,graphbulk_cli=trace",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authenticate against Microsoft Graph with app credentials
    Auth(AuthArgs),

    /// Export users or per-user resources to a JSON file
    Get(GetArgs),

    /// List the per-user resources that can be fetched
    Resources(ResourcesArgs),
}

/// Tenant and app credentials, shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct GraphArgs {
    /// JSON file with clientId, clientSecret and tenantId
    #[arg(long, global = true, env = "GRAPHBULK_CREDENTIALS", value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Application (client) ID
    #[arg(long, global = true, env = "GRAPHBULK_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Client secret
    #[arg(long, global = true, env = "GRAPHBULK_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Directory (tenant) ID
    #[arg(long, global = true, env = "GRAPHBULK_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// National cloud: commercial, us_government, china or germany
    #[arg(long, global = true, env = "GRAPHBULK_CLOUD", default_value = "commercial")]
    pub cloud: String,

    /// Override the login endpoint
    #[arg(long, global = true, env = "GRAPHBULK_LOGIN_ENDPOINT", hide = true)]
    pub login_endpoint: Option<String>,

    /// Override the Graph endpoint
    #[arg(long, global = true, env = "GRAPHBULK_GRAPH_ENDPOINT", hide = true)]
    pub graph_endpoint: Option<String>,
}
