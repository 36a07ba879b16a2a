// Wiki-creation jobs.
//
// A job is created `queued`, flips to `running` when its background task
// starts and ends `completed` (no failed page) or `failed`. The background
// task is the only writer of a job; pollers take short read locks and may
// observe any intermediate state.

pub mod orchestrator;
pub mod store;
pub mod uploader;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gaia_common::types::{JobStatus, JobView, PageResult, PageStatus, WikiRequest};
use tokio::sync::RwLock;

use crate::clickup::ClientError;

pub use orchestrator::Orchestrator;
pub use store::{InMemoryJobStore, JobStore};
pub use uploader::TreeUploader;

pub type SharedJob = Arc<RwLock<Job>>;

/// Failures that abort a job before any page is attempted.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("CLICKUP_API_KEY is not configured on the server")]
    Unconfigured,
    #[error("No ClickUp workspaces found for this API key")]
    NoWorkspaces,
    #[error(
        "Either target.doc_id (existing doc) or target.space_id (to create a new doc) must be provided."
    )]
    MissingTarget,
    #[error("workspace discovery failed: {0}")]
    Discovery(#[source] ClientError),
    #[error("document creation failed: {0}")]
    CreateDocument(#[source] ClientError),
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub workspace_id: String,
    pub doc_id: String,
    pub total_pages: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub results: Vec<PageResult>,
    /// Top-level fatal error; empty unless the job failed before its walk.
    pub error: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: impl Into<String>, request: &WikiRequest) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            workspace_id: String::new(),
            doc_id: String::new(),
            total_pages: request.total_pages(),
            uploaded: 0,
            failed: 0,
            results: PageResult::pending_tree(&request.pages),
            error: String::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Running;
    }

    /// End the walk: `completed` only when no page failed.
    pub fn finish(&mut self) {
        self.status = if self.failed == 0 { JobStatus::Completed } else { JobStatus::Failed };
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl ToString) {
        self.status = JobStatus::Failed;
        self.error = error.to_string();
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Result node at an index path (`[0, 2]` = third child of the first page).
    pub fn result_at_mut(&mut self, path: &[usize]) -> Option<&mut PageResult> {
        let (first, rest) = path.split_first()?;
        let mut node = self.results.get_mut(*first)?;
        for index in rest {
            node = node.children.get_mut(*index)?;
        }
        Some(node)
    }

    /// Descendants left `pending` beneath failed pages.
    pub fn skipped(&self) -> usize {
        fn walk(results: &[PageResult]) -> usize {
            results
                .iter()
                .map(|result| match result.status {
                    PageStatus::Failed => result.descendant_count(),
                    _ => walk(&result.children),
                })
                .sum()
        }
        walk(&self.results)
    }

    pub fn view(&self) -> JobView {
        JobView {
            job_id: self.id.clone(),
            status: self.status,
            doc_id: self.doc_id.clone(),
            workspace_id: self.workspace_id.clone(),
            total_pages: self.total_pages,
            uploaded: self.uploaded,
            failed: self.failed,
            skipped: self.skipped(),
            pages: self.results.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}
