// REST surface for wiki jobs.
//
// Routes:
//   GET  /api/v1/health               - liveness, no auth
//   POST /api/v1/wiki                 - queue a job (X-Api-Secret)
//   GET  /api/v1/wiki                 - list jobs, most recent first (X-Api-Secret)
//   GET  /api/v1/wiki/{job_id}        - one job (X-Api-Secret)
//   GET  /api/v1/wiki/create          - queue, wait, plain-text report
//   POST /api/v1/webhook/clickup      - automation webhook ingestion

mod report;
mod webhook;
mod wiki;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::error;

use crate::{
    auth::require_api_secret,
    config::ServerConfig,
    error::{ApiError, ErrorCode},
    jobs::{JobError, Orchestrator},
};

pub use report::render as render_report;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<ServerConfig>,
}

pub fn router(state: ApiState) -> Router {
    let mut protected = Router::new()
        .route("/api/v1/wiki", post(wiki::submit).get(wiki::list))
        .route("/api/v1/wiki/{job_id}", get(wiki::get_job))
        .with_state(state.clone());

    if let Some(secret) = state.config.api_secret.as_deref() {
        let secret: Arc<str> = Arc::from(secret);
        protected =
            protected.route_layer(middleware::from_fn_with_state(secret, require_api_secret));
    }

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/wiki/create", get(wiki::create_and_wait))
        .route("/api/v1/webhook/clickup", post(webhook::clickup))
        .with_state(state)
        .merge(protected)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Unconfigured => ApiError::from_code(ErrorCode::ServiceUnconfigured),
            other => {
                error!(error = %other, "wiki job could not be queued");
                ApiError::new(ErrorCode::InternalError, other.to_string())
            }
        }
    }
}
