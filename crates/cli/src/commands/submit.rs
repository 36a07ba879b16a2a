// `gaia submit`: salvage a wiki request and queue it on the orchestrator.

use std::time::Duration;

use clap::Args;
use gaia_common::types::{JobView, WikiAccepted};
use serde::Serialize;
use tracing::info;

use super::{extract::salvage_request, read_input, status, InputArgs};
use crate::client::GaiaClient;
use crate::config::CliConfig;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Poll until the job finishes and print the page tree.
    #[arg(long)]
    wait: bool,
    /// Seconds between status polls with `--wait`.
    #[arg(long, default_value_t = 2)]
    poll_secs: u64,
    /// Give up waiting after this many seconds.
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum SubmitOutcome {
    Queued(WikiAccepted),
    Finished(JobView),
}

pub async fn run(args: SubmitArgs, config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    let text = read_input(args.input.file.as_deref())?;
    let request = salvage_request(&text)?;
    info!(pages = request.total_pages(), doc_name = %request.doc_name, "submitting wiki request");

    let client = GaiaClient::new(config)?;
    let accepted = client.submit(&request).await?;

    let outcome = if args.wait {
        if format == OutputFormat::Human {
            eprintln!("Queued job {}; waiting for it to finish...", accepted.job_id);
        }
        let view = client
            .wait_for(
                &accepted.job_id,
                Duration::from_secs(args.poll_secs.max(1)),
                Duration::from_secs(args.timeout_secs),
            )
            .await?;
        SubmitOutcome::Finished(view)
    } else {
        SubmitOutcome::Queued(accepted)
    };

    output::print_output(format, &outcome, format_human)?;
    Ok(())
}

fn format_human(outcome: &SubmitOutcome) -> String {
    match outcome {
        SubmitOutcome::Queued(accepted) => format!(
            "Queued job {}\nCheck progress with: gaia status {}",
            accepted.job_id, accepted.job_id
        ),
        SubmitOutcome::Finished(view) => status::format_human(view),
    }
}
