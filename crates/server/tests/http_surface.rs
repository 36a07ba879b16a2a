use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use gaia_server::{
    build_app,
    clickup::{ApiFuture, ClientError, DocumentApi, NewPage, Workspace},
    config::ServerConfig,
    jobs::{InMemoryJobStore, Orchestrator},
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const WIKI_BODY: &str = r##"{
    "doc_name": "Handbook",
    "target": {"url": "https://app.clickup.com/9015/v/dc/doc-1"},
    "pages": [{"title": "Root", "content": "# Root", "children": [{"title": "Child"}]}]
}"##;

#[derive(Default)]
struct FakeApi {
    pages: Mutex<Vec<String>>,
    tasks: HashMap<&'static str, Value>,
}

impl DocumentApi for FakeApi {
    fn list_workspaces<'a>(&'a self) -> ApiFuture<'a, Vec<Workspace>> {
        Box::pin(async move { Ok(vec![Workspace { id: "9015".into(), name: "Acme".into() }]) })
    }

    fn create_document<'a>(
        &'a self,
        _workspace_id: &'a str,
        _name: &'a str,
        _space_id: &'a str,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move { Ok("doc-new".to_string()) })
    }

    fn create_page<'a>(&'a self, page: NewPage<'a>) -> ApiFuture<'a, String> {
        Box::pin(async move {
            self.pages.lock().expect("page log lock").push(page.title.to_string());
            Ok(format!("id-{}", page.title))
        })
    }

    fn get_task<'a>(&'a self, task_id: &'a str) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            self.tasks.get(task_id).cloned().ok_or_else(|| ClientError::Status {
                endpoint: format!("/api/v2/task/{task_id}"),
                status: 404,
                body: "not found".into(),
            })
        })
    }
}

struct Harness {
    app: Router,
    state: AppState,
    api: Arc<FakeApi>,
}

fn harness(env: &[(&str, &str)], configured: bool) -> Harness {
    let mut vars: HashMap<String, String> =
        env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    vars.entry("GAIA_WAIT_POLL_INTERVAL".into()).or_insert_with(|| "0.1".into());
    vars.entry("GAIA_WAIT_TIMEOUT".into()).or_insert_with(|| "5".into());
    let config = ServerConfig::from_env_fn(|key| {
        vars.get(key).cloned().ok_or(std::env::VarError::NotPresent)
    });

    let task_text = format!("Please build this:\n```json\n{WIKI_BODY}\n```");
    let task = json!({ "name": "Wiki task", "description": "", "text_content": task_text });
    let api = Arc::new(FakeApi {
        pages: Mutex::default(),
        tasks: HashMap::from([("86c8ce274", task)]),
    });
    let remote: Option<Arc<dyn DocumentApi>> =
        configured.then(|| Arc::clone(&api) as Arc<dyn DocumentApi>);
    let store = Arc::new(InMemoryJobStore::default());
    let orchestrator = Arc::new(Orchestrator::new(store, remote, Duration::ZERO));

    let state = AppState::new(config, orchestrator).expect("app state should build");
    Harness { app: build_app(state.clone()), state, api }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.expect("request should return a response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
    (status, String::from_utf8_lossy(&body).into_owned())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_str(&body).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request should build")
}

fn post_json(uri: &str, body: impl Into<String>, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder =
        Request::builder().method(Method::POST).uri(uri).header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.into())).expect("request should build")
}

async fn wait_for_terminal(harness: &Harness, job_id: &str) -> Value {
    let view = harness
        .state
        .orchestrator
        .await_job(job_id, Duration::from_millis(10), Duration::from_secs(5))
        .await
        .expect("job should exist");
    serde_json::to_value(view).expect("job view should serialize")
}

// ── REST ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_open_and_tagged_with_request_id() {
    let harness = harness(&[("GAIA_API_SECRET", "s3cret")], true);
    let response = harness.app.clone().oneshot(get("/api/v1/health")).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn job_routes_require_api_secret_when_configured() {
    let harness = harness(&[("GAIA_API_SECRET", "s3cret")], true);

    let (status, body) = send_json(&harness.app, post_json("/api/v1/wiki", WIKI_BODY, &[])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_INVALID_SECRET");

    let (status, _) = send_json(&harness.app, get("/api/v1/wiki")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = post_json("/api/v1/wiki", WIKI_BODY, &[("x-api-secret", "s3cret")]);
    let (status, body) = send_json(&harness.app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
}

#[tokio::test]
async fn submitted_job_runs_to_completion() {
    let harness = harness(&[], true);

    let request = post_json("/api/v1/wiki", WIKI_BODY, &[]);
    let (status, accepted) = send_json(&harness.app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = accepted["job_id"].as_str().expect("job id").to_string();
    assert_eq!(job_id.len(), 12);

    wait_for_terminal(&harness, &job_id).await;
    let (status, view) = send_json(&harness.app, get(&format!("/api/v1/wiki/{job_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "completed");
    assert_eq!(view["doc_id"], "doc-1");
    assert_eq!(view["uploaded"], 2);
    assert_eq!(view["pages"][0]["children"][0]["clickup_page_id"], "id-Child");
    assert_eq!(*harness.api.pages.lock().expect("page log lock"), ["Root", "Child"]);
}

#[tokio::test]
async fn job_list_is_most_recent_first() {
    let harness = harness(&[], true);
    let mut ids = Vec::new();
    for _ in 0..3 {
        let request = post_json("/api/v1/wiki", WIKI_BODY, &[]);
        let (_, accepted) = send_json(&harness.app, request).await;
        ids.push(accepted["job_id"].as_str().expect("job id").to_string());
    }

    let (status, list) = send_json(&harness.app, get("/api/v1/wiki")).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<_> =
        list.as_array().expect("list").iter().filter_map(|job| job["job_id"].as_str()).collect();
    ids.reverse();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn unknown_job_is_404_with_envelope() {
    let harness = harness(&[], true);
    let (status, body) = send_json(&harness.app, get("/api/v1/wiki/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "Job 'nope' not found");
}

#[tokio::test]
async fn invalid_request_is_400_with_field_path() {
    let harness = harness(&[], true);
    let body = r#"{"target": {"space_id": "1"}, "pages": [{"title": ""}]}"#;
    let (status, body) = send_json(&harness.app, post_json("/api/v1/wiki", body, &[])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "pages[0].title");
}

#[tokio::test]
async fn unconfigured_server_refuses_uploads() {
    let harness = harness(&[], false);

    let (status, body) = send_json(&harness.app, post_json("/api/v1/wiki", WIKI_BODY, &[])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "SERVICE_UNCONFIGURED");

    let (status, text) = send(&harness.app, get("/api/v1/wiki/create?url=x&pages=%5B%5D")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, "ERROR: CLICKUP_API_KEY is not configured on the server.");

    let (status, _) = send(&harness.app, post_json("/api/v1/webhook/clickup", "{}", &[])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn get_create_waits_and_reports_in_plain_text() {
    let harness = harness(&[], true);
    let pages = r##"[{"title":"Hello","content":"# Hello","children":[]}]"##;
    let uri = format!(
        "/api/v1/wiki/create?url={}&doc_name=Notes&pages={}",
        urlencode("https://app.clickup.com/9015/v/s/space-7"),
        urlencode(pages)
    );

    let (status, text) = send(&harness.app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.starts_with("WIKI CREATION COMPLETED\n"), "{text}");
    assert!(text.contains("Doc ID:    doc-new\n"));
    assert!(text.contains("- Hello (ID: id-Hello) [uploaded]"));

    let (status, text) = send(&harness.app, get("/api/v1/wiki/create?url=x&pages=oops")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.starts_with("ERROR: Invalid pages parameter: "));
}

fn urlencode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

// ── Webhook ────────────────────────────────────────────────────────

#[tokio::test]
async fn webhook_acknowledges_test_pings() {
    let harness = harness(&[], true);
    for body in ["", "{}", "test", r#"{"event": "test"}"#] {
        let (status, reply) =
            send_json(&harness.app, post_json("/api/v1/webhook/clickup", body, &[])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["status"], "ok", "{body:?}");
    }
}

#[tokio::test]
async fn webhook_accepts_direct_and_embedded_payloads() {
    let harness = harness(&[], true);

    let (_, reply) =
        send_json(&harness.app, post_json("/api/v1/webhook/clickup", WIKI_BODY, &[])).await;
    assert_eq!(reply["status"], "accepted");
    assert_eq!(reply["total_pages"], 2);
    assert_eq!(reply["message"], "Wiki creation started");

    let embedded = json!({
        "event": "taskCreated",
        "task_description": format!("Here you go:\n```\n{WIKI_BODY}\n```\nThanks"),
    });
    let (_, reply) =
        send_json(&harness.app, post_json("/api/v1/webhook/clickup", embedded.to_string(), &[]))
            .await;
    assert_eq!(reply["status"], "accepted");
}

#[tokio::test]
async fn webhook_reads_payload_query_parameter() {
    let harness = harness(&[], true);
    let uri = format!("/api/v1/webhook/clickup?payload={}", urlencode(WIKI_BODY));
    let (_, reply) = send_json(&harness.app, post_json(&uri, r#"{"event": "x"}"#, &[])).await;
    assert_eq!(reply["status"], "accepted");
}

#[tokio::test]
async fn webhook_fetches_task_description_by_id() {
    let harness = harness(&[], true);
    let body = json!({ "payload": { "id": "86c8ce274", "name": "Wiki task" } }).to_string();
    let (_, reply) = send_json(&harness.app, post_json("/api/v1/webhook/clickup", body, &[])).await;

    assert_eq!(reply["status"], "accepted");
    let job_id = reply["job_id"].as_str().expect("job id");
    let view = wait_for_terminal(&harness, job_id).await;
    assert_eq!(view["status"], "completed");
}

#[tokio::test]
async fn webhook_reports_missing_and_invalid_payloads() {
    let harness = harness(&[], true);

    let body = r#"{"event": "taskCreated", "payload": {"id": "unknown99"}}"#;
    let (status, reply) =
        send_json(&harness.app, post_json("/api/v1/webhook/clickup", body, &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["status"], "ignored");
    assert!(reply["message"].as_str().unwrap_or_default().contains("\"pages\": [...]"));

    let body = r#"{"doc_name": "X", "pages": [{"title": ""}], "target": {}}"#;
    let (_, reply) = send_json(&harness.app, post_json("/api/v1/webhook/clickup", body, &[])).await;
    assert_eq!(reply["status"], "error");
    assert!(reply["message"].as_str().unwrap_or_default().starts_with("Invalid wiki payload: "));
}

// ── MCP ────────────────────────────────────────────────────────────

fn rpc(method: &str, params: Value, id: Option<i64>) -> String {
    let mut request = json!({ "jsonrpc": "2.0", "method": method, "params": params });
    if let Some(id) = id {
        request["id"] = json!(id);
    }
    request.to_string()
}

fn tool_payload(reply: &Value) -> Value {
    let text = reply["result"]["content"][0]["text"].as_str().expect("tool text content");
    serde_json::from_str(text).expect("tool text should be json")
}

#[tokio::test]
async fn mcp_handshake_and_tool_listing() {
    let harness = harness(&[], true);

    let (_, reply) =
        send_json(&harness.app, post_json("/mcp", rpc("initialize", json!({}), Some(1)), &[]))
            .await;
    assert_eq!(reply["id"], 1);
    assert_eq!(reply["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(reply["result"]["serverInfo"]["name"], "gaia-orchestrator");

    let notification = rpc("notifications/initialized", json!({}), None);
    let (status, body) = send(&harness.app, post_json("/mcp", notification, &[])).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty());

    let (_, reply) =
        send_json(&harness.app, post_json("/mcp", rpc("tools/list", json!({}), Some(2)), &[]))
            .await;
    let names: Vec<_> = reply["result"]["tools"]
        .as_array()
        .expect("tool list")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert_eq!(names, ["create_wiki", "check_wiki_status"]);
}

#[tokio::test]
async fn mcp_create_wiki_waits_for_result() {
    let harness = harness(&[], true);
    let params = json!({
        "name": "create_wiki",
        "arguments": {
            "url": "https://app.clickup.com/9015/v/dc/doc-1/page-0",
            "pages": [{"title": "Root", "content": "body"}],
        },
    });

    let (_, reply) =
        send_json(&harness.app, post_json("/mcp", rpc("tools/call", params, Some(3)), &[])).await;
    assert_eq!(reply["result"]["isError"], false);
    let view = tool_payload(&reply);
    assert_eq!(view["status"], "completed");
    assert_eq!(view["uploaded"], 1);
    assert!(view.get("warning").is_none());

    let job_id = view["job_id"].as_str().expect("job id");
    let params = json!({ "name": "check_wiki_status", "arguments": { "job_id": job_id } });
    let (_, reply) =
        send_json(&harness.app, post_json("/mcp", rpc("tools/call", params, Some(4)), &[])).await;
    assert_eq!(tool_payload(&reply)["job_id"], job_id);
}

#[tokio::test]
async fn mcp_tool_errors_are_flagged() {
    let harness = harness(&[], true);
    let space_url = "https://x/1/v/s/2";
    let cases = [
        (
            json!({ "name": "create_wiki", "arguments": { "pages": [] } }),
            "Missing required parameter: url",
        ),
        (
            json!({ "name": "create_wiki", "arguments": { "url": space_url, "pages": [] } }),
            "Missing required parameter: pages (must be non-empty)",
        ),
        (
            json!({ "name": "check_wiki_status", "arguments": {} }),
            "Missing required parameter: job_id",
        ),
        (
            json!({ "name": "check_wiki_status", "arguments": { "job_id": "nope" } }),
            "Job 'nope' not found",
        ),
        (json!({ "name": "delete_everything" }), "Unknown tool: delete_everything"),
    ];

    for (params, message) in cases {
        let (_, reply) =
            send_json(&harness.app, post_json("/mcp", rpc("tools/call", params, Some(5)), &[]))
                .await;
        assert_eq!(reply["result"]["isError"], true);
        assert_eq!(tool_payload(&reply)["error"], message);
    }
}

#[tokio::test]
async fn mcp_protocol_errors() {
    let harness = harness(&[], true);

    let (_, reply) =
        send_json(&harness.app, post_json("/mcp", rpc("resources/list", json!({}), Some(6)), &[]))
            .await;
    assert_eq!(reply["error"]["code"], -32601);
    assert_eq!(reply["id"], 6);

    let (_, reply) = send_json(&harness.app, post_json("/mcp", "{not json", &[])).await;
    assert_eq!(reply["error"]["code"], -32700);
    assert!(reply["id"].is_null());
}

#[tokio::test]
async fn mcp_requires_bearer_token_when_jwt_secret_set() {
    let harness = harness(&[("GAIA_JWT_SECRET", "jwt-test-secret")], true);
    let body = rpc("ping", json!({}), Some(7));

    let (status, reply) = send_json(&harness.app, post_json("/mcp", body.clone(), &[])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply, json!({ "error": "unauthorized" }));

    let token =
        harness.state.tokens.issue_access_token("client-1", "mcp:tools").expect("token");
    let authorization = format!("Bearer {token}");
    let request = post_json("/mcp", body, &[("authorization", authorization.as_str())]);
    let (status, reply) = send_json(&harness.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["result"], json!({}));
}

// ── OAuth ──────────────────────────────────────────────────────────

#[tokio::test]
async fn oauth_metadata_uses_configured_issuer() {
    let harness = harness(&[("GAIA_OAUTH_ISSUER", "https://gaia.example.com/")], true);
    let (status, metadata) =
        send_json(&harness.app, get("/.well-known/oauth-authorization-server")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(metadata["issuer"], "https://gaia.example.com");
    assert_eq!(metadata["authorization_endpoint"], "https://gaia.example.com/oauth/authorize");
}
