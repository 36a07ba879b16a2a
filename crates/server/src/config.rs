// Server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development. Every setting has a `GAIA_` prefixed variable; unparseable
// numeric values fall back to their defaults.

use std::net::SocketAddr;
use std::time::Duration;

/// Core server configuration.
///
/// Constructed via [`ServerConfig::from_env`] which reads environment
/// variables and falls back to development defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// Log filter directive (e.g. `info`, `gaia_server=debug`).
    pub log_filter: String,
    /// Remote API token. Uploads are refused while unset.
    pub clickup_api_key: Option<String>,
    /// Remote API base URL, without trailing slash.
    pub clickup_api_base: String,
    /// Pause between consecutive page creations within one job.
    pub upload_delay: Duration,
    /// Page content ceiling in characters.
    pub max_content_size: usize,
    /// Scheduled retries per remote call (one final attempt follows).
    pub api_retries: u32,
    /// Backoff base; attempt `i` waits `base * 2^i`.
    pub api_retry_base_delay: Duration,
    /// Per-request HTTP timeout.
    pub api_timeout: Duration,
    /// Shared secret expected in `X-Api-Secret`. Auth is off while unset.
    pub api_secret: Option<String>,
    /// HS256 secret for MCP bearer tokens. MCP auth is off while unset.
    pub jwt_secret: Option<String>,
    /// Public issuer URL for OAuth metadata; derived per request when unset.
    pub oauth_issuer: Option<String>,
    /// Comma-separated CORS origins (or `"*"` for any).
    pub cors_origins: String,
    /// How long finished jobs are retained.
    pub job_ttl: Duration,
    /// Store capacity bound.
    pub max_jobs: usize,
    /// Ceiling on synchronous waits for GET and MCP callers.
    pub wait_timeout: Duration,
    /// Poll interval for synchronous waits, never below [`MIN_WAIT_POLL_INTERVAL`].
    pub wait_poll_interval: Duration,
}

pub const DEFAULT_CLICKUP_API_BASE: &str = "https://api.clickup.com";

pub const MIN_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `GAIA_HOST` | `0.0.0.0` |
    /// | `GAIA_PORT` | `8000` |
    /// | `GAIA_LOG_FILTER` | `info` |
    /// | `GAIA_CLICKUP_API_KEY` | *(none)* |
    /// | `GAIA_CLICKUP_API_BASE` | `https://api.clickup.com` |
    /// | `GAIA_UPLOAD_DELAY` | `1.2` (seconds) |
    /// | `GAIA_MAX_CONTENT_SIZE` | `90000` |
    /// | `GAIA_API_RETRIES` | `5` |
    /// | `GAIA_API_RETRY_BASE_DELAY` | `3.0` (seconds) |
    /// | `GAIA_API_TIMEOUT` | `60` (seconds) |
    /// | `GAIA_API_SECRET` | *(none)* |
    /// | `GAIA_JWT_SECRET` | *(none)* |
    /// | `GAIA_OAUTH_ISSUER` | *(none)* |
    /// | `GAIA_CORS_ORIGINS` | `*` |
    /// | `GAIA_JOB_TTL` | `86400` (seconds) |
    /// | `GAIA_MAX_JOBS` | `1000` |
    /// | `GAIA_WAIT_TIMEOUT` | `180` (seconds) |
    /// | `GAIA_WAIT_POLL_INTERVAL` | `2` (seconds, at least 0.1) |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    pub fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("GAIA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parsed(&env, "GAIA_PORT").unwrap_or(8000);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let log_filter = env("GAIA_LOG_FILTER").unwrap_or_else(|_| "info".into());

        let clickup_api_base = non_empty(&env, "GAIA_CLICKUP_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_CLICKUP_API_BASE.into());

        Self {
            listen_addr,
            log_filter,
            clickup_api_key: non_empty(&env, "GAIA_CLICKUP_API_KEY"),
            clickup_api_base,
            upload_delay: seconds(&env, "GAIA_UPLOAD_DELAY", Duration::from_millis(1200)),
            max_content_size: parsed(&env, "GAIA_MAX_CONTENT_SIZE").unwrap_or(90_000),
            api_retries: parsed(&env, "GAIA_API_RETRIES").unwrap_or(5),
            api_retry_base_delay: seconds(
                &env,
                "GAIA_API_RETRY_BASE_DELAY",
                Duration::from_secs(3),
            ),
            api_timeout: seconds(&env, "GAIA_API_TIMEOUT", Duration::from_secs(60)),
            api_secret: non_empty(&env, "GAIA_API_SECRET"),
            jwt_secret: non_empty(&env, "GAIA_JWT_SECRET"),
            oauth_issuer: non_empty(&env, "GAIA_OAUTH_ISSUER")
                .map(|issuer| issuer.trim_end_matches('/').to_string()),
            cors_origins: env("GAIA_CORS_ORIGINS").unwrap_or_else(|_| "*".into()),
            job_ttl: seconds(&env, "GAIA_JOB_TTL", Duration::from_secs(86_400)),
            max_jobs: parsed(&env, "GAIA_MAX_JOBS").unwrap_or(1000),
            wait_timeout: seconds(&env, "GAIA_WAIT_TIMEOUT", Duration::from_secs(180)),
            wait_poll_interval: seconds(&env, "GAIA_WAIT_POLL_INTERVAL", Duration::from_secs(2))
                .max(MIN_WAIT_POLL_INTERVAL),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env_fn(|_| Err(std::env::VarError::NotPresent))
    }
}

fn non_empty<F>(env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    env(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<F, T>(env: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: std::str::FromStr,
{
    env(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Fractional seconds, kept at millisecond precision.
fn seconds<F>(env: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    parsed::<F, f64>(env, key)
        .map(|secs| (secs * 1000.0).round())
        .filter(|millis| millis.is_finite() && *millis >= 0.0)
        .map(|millis| Duration::from_millis(millis as u64))
        .unwrap_or(default)
}
