//! CLI command implementations

pub mod auth;
pub mod get;
pub mod resource;
pub mod resources;
pub mod users;

use crate::cli::{Cli, Commands};
use crate::error::CliResult;

/// Dispatches the parsed command line.
pub async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Auth(args) => auth::execute(args, &cli.graph).await,
        Commands::Get(args) => get::execute(args, &cli.graph).await,
        Commands::Resources(args) => resources::execute(args),
    }
}
