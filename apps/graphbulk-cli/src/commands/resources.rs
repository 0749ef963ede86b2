//! `resources`: list the fetchable per-user resources.

use clap::Args;
use graphbulk_msgraph::ResourceRegistry;
use serde_json::json;

use crate::error::CliResult;

/// Arguments for the resources command
#[derive(Args, Debug)]
pub struct ResourcesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ResourcesArgs) -> CliResult<()> {
    let registry = ResourceRegistry::new();

    if args.json {
        let entries: Vec<_> = registry
            .entries()
            .iter()
            .map(|spec| {
                json!({
                    "path": spec.path,
                    "alias": spec.alias,
                    "description": spec.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{:<46} {:<14} DESCRIPTION", "RESOURCE", "ALIAS");
    for spec in registry.entries() {
        println!(
            "{:<46} {:<14} {}",
            spec.path,
            spec.alias.unwrap_or("-"),
            spec.description
        );
    }
    Ok(())
}
