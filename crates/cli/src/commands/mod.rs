// CLI subcommand dispatch.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use crate::config::CliConfig;
use crate::output::OutputFormat;

pub mod extract;
pub mod jobs;
pub mod status;
pub mod submit;

#[derive(Subcommand)]
pub enum Command {
    /// Find a wiki request in text and print it in canonical form
    Extract(extract::ExtractArgs),
    /// Extract a wiki request and queue it on the orchestrator
    Submit(submit::SubmitArgs),
    /// Show one job
    Status(status::StatusArgs),
    /// List jobs, most recent first
    Jobs(jobs::JobsArgs),
}

pub async fn run(cmd: Command, config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        Command::Extract(args) => extract::run(args, format),
        Command::Submit(args) => submit::run(args, config, format).await,
        Command::Status(args) => status::run(args, config, format).await,
        Command::Jobs(args) => jobs::run(args, config, format).await,
    }
}

/// The salvage ladder found nothing that looks like a wiki request.
#[derive(Debug, thiserror::Error)]
#[error("no payload found{}", detail_suffix(.detail))]
pub struct NoPayloadFound {
    pub detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|detail| format!(" ({detail})")).unwrap_or_default()
}

/// Read command input from a file, or stdin when `path` is absent or `-`.
pub fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Input argument shared by `extract` and `submit`.
#[derive(Debug, clap::Args)]
pub struct InputArgs {
    /// File holding the text to scan; `-` or omitted reads stdin.
    pub file: Option<PathBuf>,
}
