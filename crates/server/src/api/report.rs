// Plain-text job report for callers that can only load web pages.

use std::fmt::Write;

use gaia_common::types::{JobStatus, JobView, PageResult};

pub fn render(view: &JobView) -> String {
    let headline = match view.status {
        JobStatus::Completed => "COMPLETED",
        JobStatus::Failed => "FAILED",
        JobStatus::Queued | JobStatus::Running => "IN PROGRESS",
    };

    let mut lines = vec![
        format!("WIKI CREATION {headline}"),
        format!("Job ID:    {}", view.job_id),
        format!("Status:    {}", view.status.as_str()),
        format!("Doc ID:    {}", view.doc_id),
        format!("Uploaded:  {}", view.uploaded),
        format!("Failed:    {}", view.failed),
        String::new(),
        "Pages created:".to_string(),
    ];
    render_tree(&view.pages, 0, &mut lines);

    let mut report = lines.join("\n");
    if !view.error.is_empty() {
        let _ = write!(report, "\n\nError: {}", view.error);
    }
    report
}

fn render_tree(pages: &[PageResult], indent: usize, lines: &mut Vec<String>) {
    for page in pages {
        let id = if page.remote_id.is_empty() {
            String::new()
        } else {
            format!(" (ID: {})", page.remote_id)
        };
        lines.push(format!(
            "{}- {}{id} [{}]",
            "  ".repeat(indent),
            page.title,
            page.status.as_str()
        ));
        render_tree(&page.children, indent + 1, lines);
    }
}
