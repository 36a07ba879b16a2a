// Gaia Orchestrator HTTP service.
//
// Builds ClickUp wikis from JSON page trees. The job engine lives in `jobs`
// and talks to the remote API through `clickup`; `api`, `mcp` and
// `auth::oauth` are thin adapters in front of it.

pub mod api;
pub mod auth;
pub mod clickup;
pub mod config;
pub mod cors;
pub mod error;
pub mod jobs;
pub mod mcp;
pub mod validation;

use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tracing::{error, info};

use crate::{
    api::ApiState,
    auth::{oauth, AccessTokenService, OAuthState},
    config::ServerConfig,
    error::{incoming_request_id, scope_request_id, set_request_id_header, ApiError, ErrorCode},
    jobs::Orchestrator,
    validation::MAX_REQUEST_BODY_BYTES,
};

/// Everything the routers need, assembled once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub tokens: Arc<AccessTokenService>,
    pub oauth: Arc<OAuthState>,
}

impl AppState {
    pub fn new(config: ServerConfig, orchestrator: Arc<Orchestrator>) -> anyhow::Result<Self> {
        let tokens = Arc::new(AccessTokenService::from_config(&config)?);
        let oauth = Arc::new(OAuthState::new(Arc::clone(&tokens), config.oauth_issuer.clone()));
        Ok(Self { config: Arc::new(config), orchestrator, tokens, oauth })
    }
}

pub fn build_app(state: AppState) -> Router {
    let api_state = ApiState {
        orchestrator: Arc::clone(&state.orchestrator),
        config: Arc::clone(&state.config),
    };
    let mcp_tokens = state.config.jwt_secret.as_ref().map(|_| Arc::clone(&state.tokens));

    apply_middleware(
        Router::new()
            .merge(api::router(api_state.clone()))
            .merge(mcp::router(api_state, mcp_tokens))
            .merge(oauth::router(state.oauth)),
    )
    .layer(cors::cors_layer(&state.config.cors_origins))
}

pub fn apply_middleware(router: Router) -> Router {
    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            ApiError::from_code(ErrorCode::InternalError).into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = incoming_request_id(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = scope_request_id(request_id.clone(), next.run(request)).await;
    set_request_id_header(&mut response, &request_id);

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
