// CORS middleware configuration.
//
// Allowed origins come from `GAIA_CORS_ORIGINS` (comma-separated, or `*`).
// Agents call the service from arbitrary hosts, so the default is `*`.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build a [`CorsLayer`] from the configured origin list.
///
/// - `"*"` (or an empty value) allows any origin without credentials.
/// - A comma-separated list allows exactly those origins, with credentials.
///
/// All configurations allow the headers the API reads (`Content-Type`,
/// `Authorization`, `X-Api-Secret`, `X-Request-Id`), expose `X-Request-Id`
/// and cache preflight responses for 1 hour.
pub fn cors_layer(origins: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            HeaderName::from_static("x-api-secret"),
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(std::time::Duration::from_secs(3600));

    match origins.trim() {
        "*" | "" => base.allow_origin(AllowOrigin::any()),
        list => base.allow_origin(parse_origins(list)).allow_credentials(true),
    }
}

fn parse_origins(comma_separated: &str) -> Vec<HeaderValue> {
    comma_separated
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect()
}
