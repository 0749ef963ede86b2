//! graphbulk - bulk export of Microsoft Graph per-user resources
//!
//! This CLI enables administrators to:
//! - Check app-only credentials against a tenant
//! - Export every user in the tenant
//! - Fetch a per-user resource (authentication methods, memberships, ...)
//!   for thousands of users using `$batch` requests and a worker pool

use clap::Parser;
use tracing_subscriber::EnvFilter;

use graphbulk_cli::Cli;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for results
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match graphbulk_cli::commands::run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}
