//! `get users`: enumerate every user in the tenant.

use clap::Args;
use std::path::PathBuf;
use std::time::Instant;

use crate::cli::GraphArgs;
use crate::credentials::{self, GraphSession};
use crate::error::CliResult;
use crate::input::write_json;
use crate::output::{print_success, processed_message};

/// Arguments for `get users`
#[derive(Args, Debug)]
pub struct UsersArgs {
    /// Output JSON file
    pub output: PathBuf,
}

pub async fn execute(args: UsersArgs, graph: &GraphArgs) -> CliResult<()> {
    let start = Instant::now();
    let session = GraphSession::connect(credentials::resolve(graph)?).await?;

    let users = session.client.list_users().await?;
    write_json(&args.output, &users)?;

    print_success(&processed_message(users.len(), start.elapsed()));
    Ok(())
}
