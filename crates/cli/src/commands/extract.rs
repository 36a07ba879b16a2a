// `gaia extract`: run the salvage ladder locally and print the request.

use anyhow::Context;
use clap::Args;
use gaia_common::{salvage, types::WikiRequest};

use super::{read_input, InputArgs, NoPayloadFound};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    input: InputArgs,
}

pub fn run(args: ExtractArgs, format: OutputFormat) -> anyhow::Result<()> {
    let text = read_input(args.input.file.as_deref())?;
    let request = salvage_request(&text)?;
    output::print_output(format, &request, format_human)?;
    Ok(())
}

/// Extract and validate a wiki request from free-form text.
pub fn salvage_request(text: &str) -> anyhow::Result<WikiRequest> {
    match salvage::extract(text) {
        salvage::Extraction::Found(map) => {
            WikiRequest::from_value(serde_json::Value::Object(map))
                .context("payload found but it is not a valid wiki request")
        }
        salvage::Extraction::NotFound { diagnostics } => {
            let detail = diagnostics.map(|diag| {
                format!("last error: {} at offset {}", diag.failure.message, diag.failure.offset)
            });
            Err(NoPayloadFound { detail }.into())
        }
    }
}

fn format_human(request: &WikiRequest) -> String {
    // Pretty JSON is the human form too; the output is meant to be piped into `submit`.
    serde_json::to_string_pretty(request).unwrap_or_default()
}
