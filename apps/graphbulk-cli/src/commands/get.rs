//! `get`: export users or a per-user resource.

use clap::{Args, Subcommand};

use crate::cli::GraphArgs;
use crate::error::CliResult;

use super::resource::{self, ResourceArgs};
use super::users::{self, UsersArgs};

/// Export commands
#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(subcommand)]
    pub target: GetTarget,
}

#[derive(Subcommand, Debug)]
pub enum GetTarget {
    /// Export every user in the tenant
    Users(UsersArgs),
    /// Fetch a per-user resource for every user in an input file
    Resource(ResourceArgs),
}

pub async fn execute(args: GetArgs, graph: &GraphArgs) -> CliResult<()> {
    match args.target {
        GetTarget::Users(a) => users::execute(a, graph).await,
        GetTarget::Resource(a) => resource::execute(a, graph).await,
    }
}
