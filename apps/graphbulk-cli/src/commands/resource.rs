//! `get resource`: bulk fetch a per-user resource through `$batch`.

use clap::Args;
use graphbulk_engine::{FetchConfig, FetchEngine, FetchReport, StepErrorPolicy};
use graphbulk_msgraph::{GraphBatchTransport, ResourceRegistry, GRAPH_MAX_BATCH_SIZE};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::cli::GraphArgs;
use crate::credentials::{self, GraphSession};
use crate::error::{CliError, CliResult};
use crate::input::{read_identifiers, write_json};
use crate::output::{print_key_value, print_success, print_warning, processed_message};
use crate::progress::FetchProgress;

/// Failed identifiers listed individually before the summary collapses.
const MAX_LISTED_FAILURES: usize = 10;

/// Arguments for `get resource`
#[derive(Args, Debug)]
pub struct ResourceArgs {
    /// Resource path or alias (see `graphbulk resources`)
    pub resource: String,

    /// JSON array of objects carrying an "id", e.g. the output of `get users`
    pub input: PathBuf,

    /// Output JSON file
    pub output: PathBuf,

    /// Number of concurrent workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Identifiers per `$batch` request (at most 20)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Rate-limit retries per identifier before it is recorded as failed
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Resends of a batch after a network failure before the run aborts
    #[arg(long)]
    pub transport_retries: Option<u32>,

    /// Record per-user errors and keep going instead of aborting
    #[arg(long)]
    pub continue_on_error: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl ResourceArgs {
    /// Environment defaults overridden by flags.
    pub fn fetch_config(&self) -> CliResult<FetchConfig> {
        let mut config = FetchConfig::from_env()?;

        if let Some(workers) = self.workers {
            config = config.with_worker_count(workers);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if let Some(retries) = self.max_retries {
            config = config.with_max_rate_limit_retries(retries);
        }
        if let Some(limit) = self.transport_retries {
            config = config.with_transport_retry_limit(limit);
        }
        if self.continue_on_error {
            config = config.with_step_error_policy(StepErrorPolicy::RecordFailure);
        }

        if config.batch_size > GRAPH_MAX_BATCH_SIZE {
            return Err(CliError::Validation(format!(
                "batch size {} exceeds the Graph limit of {}",
                config.batch_size, GRAPH_MAX_BATCH_SIZE
            )));
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn execute(args: ResourceArgs, graph: &GraphArgs) -> CliResult<()> {
    let start = Instant::now();

    let registry = ResourceRegistry::new();
    let resource_path = registry
        .canonical(&args.resource)
        .map_err(|e| CliError::Validation(e.to_string()))?;
    let config = args.fetch_config()?;
    let identifiers = read_identifiers(&args.input)?;

    let session = GraphSession::connect(credentials::resolve(graph)?).await?;
    let transport = GraphBatchTransport::new(Arc::clone(&session.client));

    let progress = if args.no_progress {
        FetchProgress::hidden(identifiers.len())
    } else {
        FetchProgress::new(identifiers.len())
    };
    let engine = FetchEngine::new(config, Arc::new(registry), Arc::new(transport))
        .with_progress_hook(progress.hook());

    let cancel = engine.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping workers");
            cancel.cancel();
        }
    });

    info!("Fetching {} for {} identifiers", resource_path, identifiers.len());
    let outcome = engine.run(&identifiers, resource_path).await;
    interrupt.abort();

    match outcome {
        Ok(report) => {
            progress.finish();
            write_json(&args.output, &report.results)?;
            print_summary(&report);
            print_success(&processed_message(identifiers.len(), start.elapsed()));
            Ok(())
        }
        Err(abort) => {
            progress.abandon();
            write_json(&args.output, &abort.partial.results)?;
            print_summary(&abort.partial);
            print_warning(&format!(
                "{} identifiers were not fetched; partial results written to {}",
                abort.partial.unresolved.len(),
                args.output.display()
            ));
            Err(abort.into())
        }
    }
}

fn print_summary(report: &FetchReport) {
    print_key_value("With results", &report.results.len().to_string());
    print_key_value("Not found", &report.empty.len().to_string());
    print_key_value("Failed", &report.failed.len().to_string());
    if report.stats.pauses > 0 {
        print_key_value(
            "Rate limit pauses",
            &format!(
                "{} ({:.1}s)",
                report.stats.pauses,
                report.stats.paused_for.as_secs_f64()
            ),
        );
    }

    for (identifier, reason) in report.failed.iter().take(MAX_LISTED_FAILURES) {
        print_warning(&format!("{}: {}", identifier, reason));
    }
    if report.failed.len() > MAX_LISTED_FAILURES {
        print_warning(&format!(
            "... and {} more failures",
            report.failed.len() - MAX_LISTED_FAILURES
        ));
    }
}
