use crate::auth::jwt::{AccessTokenService, ClientGrant};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Require an OAuth-issued bearer token, from the `Authorization` header or,
/// for clients that cannot set headers, a `token` query parameter.
pub async fn require_bearer_auth(
    State(tokens): State<Arc<AccessTokenService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let from_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .and_then(|token| tokens.validate_access_token(token).ok());

    let grant = from_header.or_else(|| {
        query_tokens(request.uri().query())
            .into_iter()
            .find_map(|token| tokens.validate_access_token(&token).ok())
    });

    match grant {
        Some(grant) => {
            request.extensions_mut().insert::<ClientGrant>(grant);
            next.run(request).await
        }
        None => unauthorized_response(),
    }
}

pub fn extract_bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(token)
}

fn query_tokens(query: Option<&str>) -> Vec<String> {
    query
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn unauthorized_response() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::{extract_bearer_token, require_bearer_auth};
    use crate::auth::jwt::{AccessTokenService, ClientGrant};
    use axum::{
        body::Body,
        extract::Extension,
        http::{header::AUTHORIZATION, Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    const TEST_SECRET: &str = "gaia_test_secret";

    fn service() -> Arc<AccessTokenService> {
        Arc::new(AccessTokenService::new(TEST_SECRET).expect("service should initialize"))
    }

    fn protected_app(tokens: Arc<AccessTokenService>) -> Router {
        Router::new()
            .route(
                "/mcp",
                get(|Extension(grant): Extension<ClientGrant>| async move { grant.client_id }),
            )
            .layer(middleware::from_fn_with_state(tokens, require_bearer_auth))
    }

    async fn status_for(app: Router, uri: &str, authorization: Option<String>) -> StatusCode {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        app.oneshot(builder.body(Body::empty()).expect("request should build"))
            .await
            .expect("request should return a response")
            .status()
    }

    #[tokio::test]
    async fn rejects_requests_without_token() {
        let status = status_for(protected_app(service()), "/mcp", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_invalid_tokens() {
        let status =
            status_for(protected_app(service()), "/mcp", Some("Bearer invalid-token".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_header_token() {
        let tokens = service();
        let token = tokens.issue_access_token("client-1", "mcp:tools").expect("token");
        let status =
            status_for(protected_app(tokens), "/mcp", Some(format!("bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn accepts_query_token_fallback() {
        let tokens = service();
        let token = tokens.issue_access_token("client-1", "mcp:tools").expect("token");
        let uri = format!("/mcp?token={token}");
        let status = status_for(protected_app(tokens), &uri, Some("Bearer stale".into())).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(extract_bearer_token("BEARER abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer    "), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
    }
}
