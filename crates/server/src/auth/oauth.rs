// OAuth 2.1 authorization server for MCP clients.
//
// Authorization-code grant with PKCE plus rotating refresh tokens. Codes
// are single-use and live five minutes; refresh tokens are single-use and
// stored hashed. All state is in memory and lost on restart.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Form, Query, State},
    http::{
        header::{CONTENT_TYPE, HOST, LOCATION},
        HeaderMap, StatusCode,
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::jwt::{AccessTokenService, ACCESS_TOKEN_TTL_SECONDS};
use crate::validation::ValidatedJson;

pub const DEFAULT_SCOPE: &str = "mcp:tools";
const AUTH_CODE_TTL_SECONDS: i64 = 300;
const CLIENT_ID_BYTES: usize = 16;
const AUTH_CODE_BYTES: usize = 32;
const REFRESH_TOKEN_BYTES: usize = 48;

#[derive(Debug, Clone)]
struct AuthCode {
    client_id: String,
    redirect_uri: String,
    code_challenge: String,
    code_challenge_method: String,
    scope: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct RefreshGrant {
    client_id: String,
    scope: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegisteredClient {
    pub client_id: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
}

pub struct OAuthState {
    tokens: Arc<AccessTokenService>,
    issuer: Option<String>,
    codes: RwLock<HashMap<String, AuthCode>>,
    /// Keyed by the SHA-256 of the token.
    refresh_tokens: RwLock<HashMap<Vec<u8>, RefreshGrant>>,
    clients: RwLock<HashMap<String, RegisteredClient>>,
}

impl OAuthState {
    pub fn new(tokens: Arc<AccessTokenService>, issuer: Option<String>) -> Self {
        Self {
            tokens,
            issuer,
            codes: RwLock::new(HashMap::new()),
            refresh_tokens: RwLock::new(HashMap::new()),
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Configured issuer, or one derived from the request's host.
    fn issuer(&self, headers: &HeaderMap) -> String {
        if let Some(issuer) = &self.issuer {
            return issuer.clone();
        }
        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
        let scheme = header("x-forwarded-proto").unwrap_or("http");
        let host = header(HOST.as_str()).unwrap_or("localhost");
        format!("{scheme}://{host}")
    }

    async fn issue_tokens(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<TokenResponse, OAuthError> {
        let access_token = self.tokens.issue_access_token(client_id, scope).map_err(|err| {
            error!(error = %err, "failed to issue access token");
            OAuthError::server_error()
        })?;

        let refresh_token = random_token(REFRESH_TOKEN_BYTES);
        self.refresh_tokens.write().await.insert(
            hash_token(&refresh_token),
            RefreshGrant { client_id: client_id.to_string(), scope: scope.to_string() },
        );

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer",
            expires_in: ACCESS_TOKEN_TTL_SECONDS,
            refresh_token,
            scope: scope.to_string(),
        })
    }
}

pub fn router(state: Arc<OAuthState>) -> Router {
    Router::new()
        .route("/.well-known/oauth-authorization-server", get(metadata))
        .route("/oauth/register", post(register_client))
        .route("/oauth/authorize", get(authorize_page).post(authorize_decision))
        .route("/oauth/token", post(token))
        .with_state(state)
}

fn random_token(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

/// `S256` compares base64url(SHA-256(verifier)); any other method is `plain`.
fn verify_pkce(method: &str, challenge: &str, verifier: &str) -> bool {
    let expected = if method == "S256" {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    } else {
        verifier.to_string()
    };
    expected == challenge
}

// ─── Errors ────────────────────────────────────────────────────────────

/// RFC 6749 error body: `{"error", "error_description"?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OAuthError {
    status: StatusCode,
    error: &'static str,
    description: Option<&'static str>,
}

impl OAuthError {
    fn invalid_grant(description: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "invalid_grant",
            description: Some(description),
        }
    }

    fn server_error() -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: "server_error", description: None }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let body = match self.description {
            Some(description) => json!({ "error": self.error, "error_description": description }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

// ─── Discovery ─────────────────────────────────────────────────────────

async fn metadata(State(state): State<Arc<OAuthState>>, headers: HeaderMap) -> Json<Value> {
    let issuer = state.issuer(&headers);
    Json(json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/oauth/authorize"),
        "token_endpoint": format!("{issuer}/oauth/token"),
        "registration_endpoint": format!("{issuer}/oauth/register"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["none", "client_secret_post"],
        "scopes_supported": [DEFAULT_SCOPE],
    }))
}

// ─── Dynamic client registration ───────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RegistrationRequest {
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

async fn register_client(
    State(state): State<Arc<OAuthState>>,
    ValidatedJson(payload): ValidatedJson<RegistrationRequest>,
) -> (StatusCode, Json<RegisteredClient>) {
    let client = RegisteredClient {
        client_id: random_token(CLIENT_ID_BYTES),
        client_name: payload.client_name.unwrap_or_else(|| "Unknown".to_string()),
        redirect_uris: payload.redirect_uris,
        grant_types: vec!["authorization_code".into(), "refresh_token".into()],
        response_types: vec!["code".into()],
        token_endpoint_auth_method: "none".into(),
    };
    info!(
        client_id = %client.client_id,
        client_name = %client.client_name,
        "registered OAuth client"
    );
    state.clients.write().await.insert(client.client_id.clone(), client.clone());
    (StatusCode::CREATED, Json(client))
}

// ─── Authorization endpoint ────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthorizeParams {
    response_type: Option<String>,
    client_id: String,
    redirect_uri: String,
    code_challenge: String,
    code_challenge_method: Option<String>,
    state: String,
    scope: Option<String>,
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

async fn authorize_page(Query(params): Query<AuthorizeParams>) -> Html<String> {
    let client_label = if params.client_id.is_empty() { "ClickUp" } else { &params.client_id };
    let hidden = [
        ("response_type", params.response_type.as_deref().unwrap_or("code")),
        ("client_id", &params.client_id),
        ("redirect_uri", &params.redirect_uri),
        ("code_challenge", &params.code_challenge),
        ("code_challenge_method", params.code_challenge_method.as_deref().unwrap_or("S256")),
        ("state", &params.state),
        ("scope", params.scope.as_deref().unwrap_or(DEFAULT_SCOPE)),
    ]
    .iter()
    .map(|(name, value)| {
        format!(r#"    <input type="hidden" name="{name}" value="{}">"#, escape_html(value))
    })
    .collect::<Vec<_>>()
    .join("\n");

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>Authorize – Gaia Orchestrator</title>
<style>
  body{{font-family:system-ui,sans-serif;display:flex;justify-content:center;
       align-items:center;min-height:100vh;background:#0f172a;color:#e2e8f0;margin:0}}
  .card{{background:#1e293b;padding:2.5rem;border-radius:1rem;max-width:420px;text-align:center}}
  .client{{color:#60a5fa;font-weight:600}}
  .btn{{padding:.75rem 2rem;border-radius:.5rem;font-size:1rem;border:none;margin:.5rem}}
  .btn-primary{{background:#3b82f6;color:#fff}}
  .btn-secondary{{background:#334155;color:#94a3b8}}
</style></head><body>
<div class="card">
  <h1>Gaia Orchestrator</h1>
  <p><span class="client">{client}</span> wants to connect to create wikis on your behalf.</p>
  <form method="POST" action="/oauth/authorize">
{hidden}
    <button type="submit" name="action" value="approve" class="btn btn-primary">Authorize</button>
    <button type="submit" name="action" value="deny" class="btn btn-secondary">Deny</button>
  </form>
</div></body></html>"#,
        client = escape_html(client_label),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthorizeDecision {
    action: String,
    client_id: String,
    redirect_uri: String,
    code_challenge: String,
    code_challenge_method: Option<String>,
    state: String,
    scope: Option<String>,
}

fn redirect_with(redirect_uri: &str, pairs: &[(&str, &str)]) -> Response {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        query.append_pair(key, value);
    }
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    let location = format!("{redirect_uri}{separator}{}", query.finish());
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

async fn authorize_decision(
    State(state): State<Arc<OAuthState>>,
    Form(decision): Form<AuthorizeDecision>,
) -> Response {
    if decision.action != "approve" {
        info!(client_id = %decision.client_id, "authorization denied");
        let mut pairs = vec![("error", "access_denied")];
        pairs.push(("error_description", "User denied access"));
        if !decision.state.is_empty() {
            pairs.push(("state", decision.state.as_str()));
        }
        return redirect_with(&decision.redirect_uri, &pairs);
    }

    let code = random_token(AUTH_CODE_BYTES);
    state.codes.write().await.insert(
        code.clone(),
        AuthCode {
            client_id: decision.client_id.clone(),
            redirect_uri: decision.redirect_uri.clone(),
            code_challenge: decision.code_challenge.clone(),
            code_challenge_method: decision
                .code_challenge_method
                .clone()
                .unwrap_or_else(|| "S256".to_string()),
            scope: decision.scope.clone().unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            expires_at: Utc::now() + Duration::seconds(AUTH_CODE_TTL_SECONDS),
        },
    );
    info!(client_id = %decision.client_id, "authorization code issued");

    let mut pairs = vec![("code", code.as_str())];
    if !decision.state.is_empty() {
        pairs.push(("state", decision.state.as_str()));
    }
    redirect_with(&decision.redirect_uri, &pairs)
}

// ─── Token endpoint ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: i64,
    refresh_token: String,
    scope: String,
}

/// Token request fields from a JSON or form-encoded body.
fn token_params(headers: &HeaderMap, body: &[u8]) -> HashMap<String, String> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.contains("json"));

    if is_json {
        let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
            return HashMap::new();
        };
        map.into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(text) => Some((key, text)),
                Value::Null => None,
                other => Some((key, other.to_string())),
            })
            .collect()
    } else {
        url::form_urlencoded::parse(body).into_owned().collect()
    }
}

async fn token(State(state): State<Arc<OAuthState>>, headers: HeaderMap, body: Bytes) -> Response {
    let params = token_params(&headers, &body);
    let param = |key: &str| params.get(key).map(String::as_str).unwrap_or_default();

    let result = match param("grant_type") {
        "authorization_code" => {
            exchange_code(
                &state,
                param("code"),
                param("code_verifier"),
                param("client_id"),
                params.get("redirect_uri").map(String::as_str).filter(|uri| !uri.is_empty()),
            )
            .await
        }
        "refresh_token" => refresh(&state, param("refresh_token"), param("client_id")).await,
        other => {
            warn!(grant_type = other, "unsupported grant type");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unsupported_grant_type" })))
                .into_response();
        }
    };

    match result {
        Ok(tokens) => Json(tokens).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn exchange_code(
    state: &OAuthState,
    code: &str,
    verifier: &str,
    client_id: &str,
    redirect_uri: Option<&str>,
) -> Result<TokenResponse, OAuthError> {
    let stored = state
        .codes
        .write()
        .await
        .remove(code)
        .ok_or_else(|| OAuthError::invalid_grant("Invalid or expired code"))?;

    if stored.expires_at < Utc::now() {
        return Err(OAuthError::invalid_grant("Code expired"));
    }
    if stored.client_id != client_id {
        return Err(OAuthError::invalid_grant("Client ID mismatch"));
    }
    if redirect_uri.is_some_and(|uri| uri != stored.redirect_uri) {
        return Err(OAuthError::invalid_grant("Redirect URI mismatch"));
    }
    if !verify_pkce(&stored.code_challenge_method, &stored.code_challenge, verifier) {
        return Err(OAuthError::invalid_grant("PKCE verification failed"));
    }

    info!(client_id, "authorization code exchanged");
    state.issue_tokens(client_id, &stored.scope).await
}

async fn refresh(
    state: &OAuthState,
    refresh_token: &str,
    client_id: &str,
) -> Result<TokenResponse, OAuthError> {
    let stored = state.refresh_tokens.write().await.remove(&hash_token(refresh_token));
    match stored {
        Some(grant) if grant.client_id == client_id => {
            state.issue_tokens(client_id, &grant.scope).await
        }
        _ => Err(OAuthError {
            status: StatusCode::BAD_REQUEST,
            error: "invalid_grant",
            description: None,
        }),
    }
}
