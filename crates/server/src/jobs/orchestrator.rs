use std::{sync::Arc, time::Duration};

use gaia_common::{
    location::Placement,
    types::{JobView, TargetLocation, WikiRequest},
};
use tokio::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use super::{uploader::TreeUploader, Job, JobError, JobStore, SharedJob};
use crate::clickup::DocumentApi;

/// Owns job lifecycle: creation, background execution and lookup.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    api: Option<Arc<dyn DocumentApi>>,
    upload_delay: Duration,
}

/// Where the walk starts once the destination exists.
struct Destination {
    workspace_id: String,
    doc_id: String,
    parent_page_id: Option<String>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        api: Option<Arc<dyn DocumentApi>>,
        upload_delay: Duration,
    ) -> Self {
        Self { store, api, upload_delay }
    }

    /// Whether a remote API is configured; uploads are refused otherwise.
    pub fn is_configured(&self) -> bool {
        self.api.is_some()
    }

    pub fn api(&self) -> Option<&Arc<dyn DocumentApi>> {
        self.api.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Queue a job and start its background task. Never waits on the network.
    pub async fn submit(&self, request: WikiRequest) -> Result<String, JobError> {
        let api = self.api.clone().ok_or(JobError::Unconfigured)?;

        let job_id = new_job_id();
        let job = self.store.put(Job::new(job_id.clone(), &request)).await;
        info!(
            job_id = %job_id,
            doc_name = %request.doc_name,
            total_pages = request.total_pages(),
            "wiki job queued"
        );

        let task = tokio::spawn(run_job(api, Arc::clone(&job), request, self.upload_delay));
        tokio::spawn(supervise(job_id.clone(), job, task));

        Ok(job_id)
    }

    pub async fn get(&self, job_id: &str) -> Option<JobView> {
        let job = self.store.get(job_id).await?;
        let view = job.read().await.view();
        Some(view)
    }

    /// Every job, in creation order.
    pub async fn list(&self) -> Vec<JobView> {
        let mut views = Vec::new();
        for job in self.store.list().await {
            views.push(job.read().await.view());
        }
        views
    }

    /// Poll until the job is terminal or `timeout` elapses; returns the
    /// latest snapshot either way.
    pub async fn await_job(
        &self,
        job_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Option<JobView> {
        let deadline = Instant::now() + timeout;
        loop {
            let view = self.get(job_id).await?;
            let now = Instant::now();
            if view.status.is_terminal() || now >= deadline {
                return Some(view);
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }
}

fn new_job_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Propagate a crash of the upload task into the job record.
async fn supervise(job_id: String, job: SharedJob, task: tokio::task::JoinHandle<()>) {
    if let Err(join_error) = task.await {
        error!(job_id = %job_id, ?join_error, "wiki job task crashed");
        let mut job = job.write().await;
        if !job.is_finished() {
            let reason = if join_error.is_panic() { "panicked" } else { "was cancelled" };
            job.fail(format!("upload task {reason}"));
        }
    }
}

async fn run_job(
    api: Arc<dyn DocumentApi>,
    job: SharedJob,
    request: WikiRequest,
    upload_delay: Duration,
) {
    let job_id = {
        let mut job = job.write().await;
        job.start();
        job.id.clone()
    };

    let prepared = prepare(api.as_ref(), &job, &request.target, &request.doc_name).await;
    let destination = match prepared {
        Ok(destination) => destination,
        Err(err) => {
            error!(job_id = %job_id, error = %err, "wiki job failed before upload");
            job.write().await.fail(err);
            return;
        }
    };

    info!(
        job_id = %job_id,
        doc_id = %destination.doc_id,
        total_pages = request.total_pages(),
        "starting page upload"
    );
    TreeUploader {
        api: api.as_ref(),
        job: &job,
        workspace_id: &destination.workspace_id,
        doc_id: &destination.doc_id,
        delay: upload_delay,
    }
    .upload(&request.pages, destination.parent_page_id.as_deref())
    .await;

    let mut job = job.write().await;
    job.finish();
    info!(
        job_id = %job_id,
        status = job.status.as_str(),
        uploaded = job.uploaded,
        failed = job.failed,
        "wiki job finished"
    );
}

/// Resolve the workspace and the document the tree goes into, creating the
/// document when the target names a space.
async fn prepare(
    api: &dyn DocumentApi,
    job: &SharedJob,
    target: &TargetLocation,
    doc_name: &str,
) -> Result<Destination, JobError> {
    let resolved = target.resolve();

    let workspace_id = match resolved.workspace_id.clone() {
        Some(id) => id,
        None => {
            let workspace = api
                .list_workspaces()
                .await
                .map_err(JobError::Discovery)?
                .into_iter()
                .next()
                .ok_or(JobError::NoWorkspaces)?;
            info!(workspace_id = %workspace.id, name = %workspace.name, "auto-detected workspace");
            workspace.id
        }
    };
    job.write().await.workspace_id = workspace_id.clone();

    let (doc_id, parent_page_id) = match resolved.placement() {
        Placement::Append { doc_id, parent_page_id } => (doc_id, parent_page_id),
        Placement::Create { space_id } => {
            let doc_id = api
                .create_document(&workspace_id, doc_name, &space_id)
                .await
                .map_err(JobError::CreateDocument)?;
            (doc_id, None)
        }
        Placement::Unresolved => return Err(JobError::MissingTarget),
    };
    job.write().await.doc_id = doc_id.clone();

    Ok(Destination { workspace_id, doc_id, parent_page_id })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use gaia_common::types::{JobStatus, PageSpec, PageStatus};
    use serde_json::Value;

    use super::*;
    use crate::clickup::{ApiFuture, ClientError, NewPage, Workspace};
    use crate::jobs::InMemoryJobStore;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Call {
        title: String,
        parent: Option<String>,
    }

    #[derive(Default)]
    struct FakeApi {
        calls: Mutex<Vec<Call>>,
        docs: Mutex<Vec<(String, String, String)>>,
        fail_titles: Vec<&'static str>,
        panic_titles: Vec<&'static str>,
        workspaces: Vec<Workspace>,
    }

    impl FakeApi {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("call log lock").clone()
        }
    }

    impl DocumentApi for FakeApi {
        fn list_workspaces<'a>(&'a self) -> ApiFuture<'a, Vec<Workspace>> {
            Box::pin(async move { Ok(self.workspaces.clone()) })
        }

        fn create_document<'a>(
            &'a self,
            workspace_id: &'a str,
            name: &'a str,
            space_id: &'a str,
        ) -> ApiFuture<'a, String> {
            Box::pin(async move {
                self.docs.lock().expect("doc log lock").push((
                    workspace_id.to_string(),
                    name.to_string(),
                    space_id.to_string(),
                ));
                Ok("doc-new".to_string())
            })
        }

        fn create_page<'a>(&'a self, page: NewPage<'a>) -> ApiFuture<'a, String> {
            Box::pin(async move {
                if self.panic_titles.iter().any(|title| *title == page.title) {
                    panic!("fake api exploded");
                }
                self.calls.lock().expect("call log lock").push(Call {
                    title: page.title.to_string(),
                    parent: page.parent_page_id.map(str::to_string),
                });
                if self.fail_titles.iter().any(|title| *title == page.title) {
                    return Err(ClientError::Status {
                        endpoint: "/pages".into(),
                        status: 400,
                        body: "rejected".into(),
                    });
                }
                Ok(format!("id-{}", page.title))
            })
        }

        fn get_task<'a>(&'a self, _task_id: &'a str) -> ApiFuture<'a, Value> {
            Box::pin(async move { Ok(Value::Null) })
        }
    }

    fn orchestrator(api: Arc<FakeApi>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(InMemoryJobStore::default()),
            Some(api),
            Duration::from_millis(1200),
        )
    }

    /// A(B(D), C)
    fn request(target: TargetLocation) -> WikiRequest {
        WikiRequest {
            doc_name: "Team Wiki".into(),
            target,
            pages: vec![PageSpec::new("A", "# A").with_children(vec![
                PageSpec::new("B", "").with_children(vec![PageSpec::new("D", "")]),
                PageSpec::new("C", ""),
            ])],
        }
    }

    fn doc_target() -> TargetLocation {
        TargetLocation {
            workspace_id: Some("ws".into()),
            doc_id: Some("doc-1".into()),
            ..TargetLocation::default()
        }
    }

    async fn run_to_end(orchestrator: &Orchestrator, request: WikiRequest) -> JobView {
        let job_id = orchestrator.submit(request).await.expect("job should be queued");
        orchestrator
            .await_job(&job_id, Duration::from_secs(1), Duration::from_secs(600))
            .await
            .expect("job should exist")
    }

    fn call(title: &str, parent: Option<&str>) -> Call {
        Call { title: title.into(), parent: parent.map(str::to_string) }
    }

    #[tokio::test(start_paused = true)]
    async fn uploads_depth_first_with_parent_ids() {
        let api = Arc::new(FakeApi::default());
        let view = run_to_end(&orchestrator(Arc::clone(&api)), request(doc_target())).await;

        assert_eq!(
            api.calls(),
            vec![
                call("A", None),
                call("B", Some("id-A")),
                call("D", Some("id-B")),
                call("C", Some("id-A")),
            ]
        );
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.total_pages, 4);
        assert_eq!(view.uploaded, 4);
        assert_eq!(view.doc_id, "doc-1");
        assert_eq!(view.pages[0].children[0].children[0].remote_id, "id-D");
        assert!(view.finished_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_page_skips_subtree_but_not_siblings() {
        let api = Arc::new(FakeApi { fail_titles: vec!["B"], ..FakeApi::default() });
        let view = run_to_end(&orchestrator(Arc::clone(&api)), request(doc_target())).await;

        assert_eq!(
            api.calls(),
            vec![call("A", None), call("B", Some("id-A")), call("C", Some("id-A"))]
        );
        let b = &view.pages[0].children[0];
        assert_eq!(b.status, PageStatus::Failed);
        assert!(b.error.contains("HTTP 400"));
        assert_eq!(b.children[0].status, PageStatus::Pending);
        assert_eq!(view.pages[0].children[1].status, PageStatus::Uploaded);
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!((view.uploaded, view.failed, view.skipped), (2, 1, 1));
        assert!(view.error.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn parent_page_from_target_seeds_top_level() {
        let api = Arc::new(FakeApi::default());
        let target = TargetLocation::from_url("https://app.clickup.com/9015/v/dc/abc-1/abc-77");
        run_to_end(&orchestrator(Arc::clone(&api)), request(target)).await;

        assert_eq!(api.calls()[0], call("A", Some("abc-77")));
    }

    #[tokio::test(start_paused = true)]
    async fn space_target_creates_document_in_discovered_workspace() {
        let api = Arc::new(FakeApi {
            workspaces: vec![
                Workspace { id: "w1".into(), name: "First".into() },
                Workspace { id: "w2".into(), name: "Second".into() },
            ],
            ..FakeApi::default()
        });
        let target =
            TargetLocation { space_id: Some("space-9".into()), ..TargetLocation::default() };
        let view = run_to_end(&orchestrator(Arc::clone(&api)), request(target)).await;

        assert_eq!(
            api.docs.lock().expect("doc log lock").clone(),
            vec![("w1".to_string(), "Team Wiki".to_string(), "space-9".to_string())]
        );
        assert_eq!(view.workspace_id, "w1");
        assert_eq!(view.doc_id, "doc-new");
        assert_eq!(view.status, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_workspaces_fail_the_job() {
        let api = Arc::new(FakeApi::default());
        let target =
            TargetLocation { space_id: Some("space-9".into()), ..TargetLocation::default() };
        let view = run_to_end(&orchestrator(Arc::clone(&api)), request(target)).await;

        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error, "No ClickUp workspaces found for this API key");
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_target_fails_before_any_page() {
        let api = Arc::new(FakeApi::default());
        let target =
            TargetLocation { workspace_id: Some("ws".into()), ..TargetLocation::default() };
        let view = run_to_end(&orchestrator(Arc::clone(&api)), request(target)).await;

        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.error.contains("target.space_id"));
        assert_eq!(view.workspace_id, "ws");
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_task_marks_job_failed() {
        let api = Arc::new(FakeApi { panic_titles: vec!["A"], ..FakeApi::default() });
        let view = run_to_end(&orchestrator(api), request(doc_target())).await;

        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error, "upload task panicked");
    }

    #[tokio::test(start_paused = true)]
    async fn submit_returns_before_upload_starts() {
        let api = Arc::new(FakeApi::default());
        let orchestrator = orchestrator(Arc::clone(&api));
        let job_id = orchestrator.submit(request(doc_target())).await.expect("queued");

        assert_eq!(job_id.len(), 12);
        let view = orchestrator.get(&job_id).await.expect("job should exist");
        assert_eq!(view.status, JobStatus::Queued);
        assert_eq!(view.total_pages, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn await_job_returns_running_snapshot_on_timeout() {
        let api = Arc::new(FakeApi::default());
        let orchestrator = orchestrator(api);
        let job_id = orchestrator.submit(request(doc_target())).await.expect("queued");

        let view = orchestrator
            .await_job(&job_id, Duration::from_millis(100), Duration::from_millis(500))
            .await
            .expect("job should exist");
        assert_eq!(view.status, JobStatus::Running);
        assert!(view.uploaded < 4);
    }

    #[tokio::test]
    async fn unconfigured_orchestrator_refuses_jobs() {
        let orchestrator =
            Orchestrator::new(Arc::new(InMemoryJobStore::default()), None, Duration::ZERO);
        assert!(!orchestrator.is_configured());
        assert!(matches!(
            orchestrator.submit(request(doc_target())).await,
            Err(JobError::Unconfigured)
        ));
        assert!(orchestrator.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn list_preserves_creation_order() {
        let orchestrator = orchestrator(Arc::new(FakeApi::default()));
        let first = orchestrator.submit(request(doc_target())).await.expect("queued");
        let second = orchestrator.submit(request(doc_target())).await.expect("queued");

        let ids: Vec<String> = orchestrator.list().await.into_iter().map(|v| v.job_id).collect();
        assert_eq!(ids, vec![first, second]);
        let missing =
            orchestrator.await_job("missing", Duration::from_secs(1), Duration::ZERO).await;
        assert!(missing.is_none());
    }
}
