use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use gaia_server::{
    build_app,
    clickup::{ClickUpClient, ClientSettings, DocumentApi},
    config::ServerConfig,
    jobs::{InMemoryJobStore, JobStore, Orchestrator},
    shutdown_signal, AppState,
};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const EVICTION_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(&config.log_filter)).init();

    let api: Option<Arc<dyn DocumentApi>> = match config.clickup_api_key.as_deref() {
        Some(key) => Some(Arc::new(
            ClickUpClient::new(key, ClientSettings::from_config(&config))
                .context("failed to build ClickUp client")?,
        )),
        None => {
            warn!("GAIA_CLICKUP_API_KEY is not set; wiki uploads will be refused");
            None
        }
    };

    let store: Arc<dyn JobStore> =
        Arc::new(InMemoryJobStore::new(config.job_ttl, config.max_jobs));
    tokio::spawn(sweep_expired_jobs(Arc::clone(&store)));

    let orchestrator = Arc::new(Orchestrator::new(store, api, config.upload_delay));
    let listen_addr = config.listen_addr;
    if config.api_secret.is_none() {
        warn!("GAIA_API_SECRET is not set; REST job routes are unauthenticated");
    }
    if config.jwt_secret.is_none() {
        warn!("GAIA_JWT_SECRET is not set; the MCP endpoint is unauthenticated");
    }

    let state = AppState::new(config, orchestrator).context("invalid auth configuration")?;
    let app = build_app(state);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind listener on {listen_addr}"))?;

    info!(listen_addr = %listen_addr, "starting gaia orchestrator");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited unexpectedly")
}

async fn sweep_expired_jobs(store: Arc<dyn JobStore>) {
    let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
    loop {
        ticker.tick().await;
        let evicted = store.evict_expired(Utc::now()).await;
        if evicted > 0 {
            info!(evicted, "evicted expired jobs");
        } else {
            debug!("no expired jobs to evict");
        }
    }
}
