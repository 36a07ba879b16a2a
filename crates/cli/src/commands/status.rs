// `gaia status`: show one job and its page tree.

use clap::Args;
use gaia_common::types::{JobView, PageResult};

use crate::client::GaiaClient;
use crate::config::CliConfig;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Job identifier returned by `gaia submit`.
    job_id: String,
}

pub async fn run(args: StatusArgs, config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    let client = GaiaClient::new(config)?;
    let view = client.job(&args.job_id).await?;
    output::print_output(format, &view, format_human)?;
    Ok(())
}

pub fn format_human(view: &JobView) -> String {
    let mut lines = vec![format!("Job {} [{}]", view.job_id, view.status.as_str())];
    if !view.doc_id.is_empty() {
        lines.push(format!("  Doc:      {}", view.doc_id));
    }
    lines.push(format!(
        "  Pages:    {} uploaded, {} failed, {} skipped of {}",
        view.uploaded, view.failed, view.skipped, view.total_pages
    ));
    lines.push(format!("  Created:  {}", view.created_at.to_rfc3339()));
    if let Some(finished_at) = view.finished_at {
        lines.push(format!("  Finished: {}", finished_at.to_rfc3339()));
    }
    if !view.error.is_empty() {
        lines.push(format!("  Error:    {}", view.error));
    }
    if !view.pages.is_empty() {
        lines.push(String::new());
        push_tree(&mut lines, &view.pages, 1);
    }
    lines.join("\n")
}

fn push_tree(lines: &mut Vec<String>, pages: &[PageResult], depth: usize) {
    for page in pages {
        let indent = "  ".repeat(depth);
        let mut line = format!("{indent}- {} [{}]", page.title, page.status.as_str());
        if !page.remote_id.is_empty() {
            line.push_str(&format!(" {}", page.remote_id));
        }
        if !page.error.is_empty() {
            line.push_str(&format!(": {}", page.error));
        }
        lines.push(line);
        push_tree(lines, &page.children, depth + 1);
    }
}
