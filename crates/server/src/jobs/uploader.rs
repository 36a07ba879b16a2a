// Depth-first page tree upload.
//
// Pages are created strictly one at a time, parents before children and
// siblings in input order. A failed page keeps its whole subtree `pending`
// and the walk moves on to its next sibling.

use std::time::Duration;

use gaia_common::types::{PageSpec, PageStatus};
use tracing::{error, info};

use super::SharedJob;
use crate::clickup::{DocumentApi, NewPage};

pub struct TreeUploader<'a> {
    pub api: &'a dyn DocumentApi,
    pub job: &'a SharedJob,
    pub workspace_id: &'a str,
    pub doc_id: &'a str,
    /// Courtesy pause after each created page.
    pub delay: Duration,
}

struct Frame {
    path: Vec<usize>,
    parent_page_id: Option<String>,
}

fn page_at<'p>(pages: &'p [PageSpec], path: &[usize]) -> Option<&'p PageSpec> {
    let (first, rest) = path.split_first()?;
    let mut page = pages.get(*first)?;
    for index in rest {
        page = page.children.get(*index)?;
    }
    Some(page)
}

/// Push `count` children of `path` so that the first child is popped first.
fn push_children(stack: &mut Vec<Frame>, path: &[usize], count: usize, parent: Option<&str>) {
    for index in (0..count).rev() {
        let mut child = path.to_vec();
        child.push(index);
        stack.push(Frame { path: child, parent_page_id: parent.map(str::to_string) });
    }
}

impl TreeUploader<'_> {
    /// Walk `pages`, nesting top-level pages under `root_parent` when given.
    pub async fn upload(&self, pages: &[PageSpec], root_parent: Option<&str>) {
        let job_id = self.job.read().await.id.clone();
        let mut stack = Vec::new();
        push_children(&mut stack, &[], pages.len(), root_parent);

        while let Some(Frame { path, parent_page_id }) = stack.pop() {
            let Some(page) = page_at(pages, &path) else { continue };
            let depth = path.len() - 1;

            if let Some(result) = self.job.write().await.result_at_mut(&path) {
                result.status = PageStatus::Uploading;
            }
            info!(job_id = %job_id, depth, title = %page.title, "uploading page");

            let created = self
                .api
                .create_page(NewPage {
                    workspace_id: self.workspace_id,
                    doc_id: self.doc_id,
                    title: &page.title,
                    content: &page.content,
                    parent_page_id: parent_page_id.as_deref(),
                })
                .await;

            match created {
                Ok(page_id) => {
                    {
                        let mut job = self.job.write().await;
                        if let Some(result) = job.result_at_mut(&path) {
                            result.remote_id = page_id.clone();
                            result.status = PageStatus::Uploaded;
                        }
                        job.uploaded += 1;
                    }
                    tokio::time::sleep(self.delay).await;
                    push_children(&mut stack, &path, page.children.len(), Some(&page_id));
                }
                Err(err) => {
                    error!(
                        job_id = %job_id,
                        title = %page.title,
                        error = %err,
                        "page upload failed"
                    );
                    let mut job = self.job.write().await;
                    if let Some(result) = job.result_at_mut(&path) {
                        result.status = PageStatus::Failed;
                        result.error = err.to_string();
                    }
                    job.failed += 1;
                }
            }
        }
    }
}
