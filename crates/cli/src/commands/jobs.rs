// `gaia jobs`: list jobs known to the orchestrator.

use clap::Args;
use gaia_common::types::JobView;

use crate::client::GaiaClient;
use crate::config::CliConfig;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct JobsArgs {
    /// Show at most this many jobs.
    #[arg(long)]
    limit: Option<usize>,
}

pub async fn run(args: JobsArgs, config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    let client = GaiaClient::new(config)?;
    let mut jobs = client.jobs().await?;
    if let Some(limit) = args.limit {
        jobs.truncate(limit);
    }
    output::print_output(format, &jobs, |jobs| format_human(jobs))?;
    Ok(())
}

fn format_human(jobs: &[JobView]) -> String {
    if jobs.is_empty() {
        return "No jobs.".to_string();
    }
    jobs.iter()
        .map(|job| {
            format!(
                "{}  {:<9}  {}/{} uploaded  {}",
                job.job_id,
                job.status.as_str(),
                job.uploaded,
                job.total_pages,
                job.created_at.format("%Y-%m-%d %H:%M:%S")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
