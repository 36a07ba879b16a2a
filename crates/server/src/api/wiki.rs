use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use gaia_common::types::{JobView, WikiAccepted, WikiRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{report, ApiState};
use crate::{error::ApiError, validation::ValidWiki};

pub(super) async fn submit(
    State(state): State<ApiState>,
    ValidWiki(request): ValidWiki,
) -> Result<(StatusCode, Json<WikiAccepted>), ApiError> {
    let job_id = state.orchestrator.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(WikiAccepted::queued(job_id))))
}

pub(super) async fn list(State(state): State<ApiState>) -> Json<Vec<JobView>> {
    let mut jobs = state.orchestrator.list().await;
    jobs.reverse();
    Json(jobs)
}

pub(super) async fn get_job(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    state
        .orchestrator
        .get(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Job '{job_id}' not found")))
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateQuery {
    url: Option<String>,
    pages: Option<String>,
    doc_name: Option<String>,
}

/// Queue a job from query parameters, wait for it, and answer in plain text.
pub(super) async fn create_and_wait(
    State(state): State<ApiState>,
    Query(query): Query<CreateQuery>,
) -> (StatusCode, String) {
    if !state.orchestrator.is_configured() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERROR: CLICKUP_API_KEY is not configured on the server.".to_string(),
        );
    }

    let request = match request_from_query(query) {
        Ok(request) => request,
        Err(message) => return (StatusCode::BAD_REQUEST, format!("ERROR: {message}")),
    };
    let total_pages = request.total_pages();

    let job_id = match state.orchestrator.submit(request).await {
        Ok(job_id) => job_id,
        Err(err) => return (StatusCode::INTERNAL_SERVER_ERROR, format!("ERROR: {err}")),
    };
    info!(job_id = %job_id, total_pages, "GET wiki/create: job started");

    let config = &state.config;
    let view =
        state.orchestrator.await_job(&job_id, config.wait_poll_interval, config.wait_timeout).await;
    match view {
        Some(view) => (StatusCode::OK, report::render(&view)),
        None => (StatusCode::INTERNAL_SERVER_ERROR, format!("ERROR: Job {job_id} not found.")),
    }
}

fn request_from_query(query: CreateQuery) -> Result<WikiRequest, String> {
    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| "Missing required parameter: url".to_string())?;
    let raw_pages = query.pages.unwrap_or_default();

    let pages: Value = serde_json::from_str(&raw_pages)
        .map_err(|err| format!("Invalid pages parameter: {err}"))?;
    if !pages.as_array().is_some_and(|pages| !pages.is_empty()) {
        return Err("Invalid pages parameter: pages must be a non-empty JSON array".to_string());
    }

    let mut body = json!({ "target": { "url": url }, "pages": pages });
    if let Some(doc_name) = query.doc_name {
        body["doc_name"] = Value::String(doc_name);
    }
    WikiRequest::from_value(body).map_err(|err| format!("Invalid pages parameter: {err}"))
}
