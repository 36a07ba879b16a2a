// MCP tool endpoint: JSON-RPC 2.0 over plain HTTP POST.
//
// One request per POST, one JSON response back. Notifications are
// acknowledged with 202 and no body.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use gaia_common::{
    protocol::{
        jsonrpc::{self, RequestId, RpcError},
        mcp::{self, ToolCall, ToolResult},
    },
    types::WikiRequest,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    api::ApiState,
    auth::{require_bearer_auth, AccessTokenService},
};

const STILL_RUNNING_WARNING: &str = "Job still running. Use check_wiki_status to poll.";

/// `POST /mcp`, behind bearer auth when `tokens` is given.
pub fn router(state: ApiState, tokens: Option<Arc<AccessTokenService>>) -> Router {
    let router = Router::new().route("/mcp", post(handle_rpc)).with_state(state);
    match tokens {
        Some(tokens) => {
            router.route_layer(middleware::from_fn_with_state(tokens, require_bearer_auth))
        }
        None => router,
    }
}

async fn handle_rpc(State(state): State<ApiState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "malformed JSON-RPC body");
            let error = RpcError::new(jsonrpc::PARSE_ERROR, format!("Parse error: {err}"));
            return Json(jsonrpc::Response::error(RequestId::Null, error)).into_response();
        }
    };

    let request: jsonrpc::Request = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(err) => {
            let error = RpcError::new(jsonrpc::INVALID_REQUEST, format!("Invalid request: {err}"));
            return Json(jsonrpc::Response::error(RequestId::Null, error)).into_response();
        }
    };

    let Some(id) = request.id.clone() else {
        debug!(method = %request.method, "MCP notification");
        return StatusCode::ACCEPTED.into_response();
    };

    let response = match dispatch(&state, &request.method, request.params).await {
        Ok(result) => jsonrpc::Response::success(id, result),
        Err(error) => jsonrpc::Response::error(id, error),
    };
    Json(response).into_response()
}

async fn dispatch(
    state: &ApiState,
    method: &str,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    match method {
        mcp::INITIALIZE => Ok(json!({
            "protocolVersion": mcp::PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": mcp::SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
        })),
        mcp::PING => Ok(json!({})),
        mcp::TOOLS_LIST => Ok(json!({ "tools": mcp::tool_definitions() })),
        mcp::TOOLS_CALL => {
            let call: ToolCall = serde_json::from_value(params.unwrap_or(Value::Null))
                .map_err(|err| RpcError::new(jsonrpc::INVALID_PARAMS, err.to_string()))?;
            let result = call_tool(state, call).await;
            serde_json::to_value(result)
                .map_err(|err| RpcError::new(jsonrpc::INTERNAL_ERROR, err.to_string()))
        }
        other => Err(RpcError::method_not_found(other)),
    }
}

async fn call_tool(state: &ApiState, call: ToolCall) -> ToolResult {
    let arguments = match call.arguments {
        Some(Value::Object(arguments)) => Value::Object(arguments),
        _ => json!({}),
    };
    info!(tool = %call.name, "MCP tool call");

    match call.name.as_str() {
        mcp::TOOL_CREATE_WIKI => create_wiki(state, &arguments).await,
        mcp::TOOL_CHECK_WIKI_STATUS => check_wiki_status(state, &arguments).await,
        other => ToolResult::error(format!("Unknown tool: {other}")),
    }
}

async fn create_wiki(state: &ApiState, arguments: &Value) -> ToolResult {
    let url = arguments.get("url").and_then(Value::as_str).unwrap_or_default();
    if url.is_empty() {
        return ToolResult::error("Missing required parameter: url");
    }
    let pages = arguments.get("pages").cloned().unwrap_or(Value::Null);
    if !pages.as_array().is_some_and(|pages| !pages.is_empty()) {
        return ToolResult::error("Missing required parameter: pages (must be non-empty)");
    }

    let mut body = json!({ "target": { "url": url }, "pages": pages });
    if let Some(doc_name) = arguments.get("doc_name").filter(|name| name.is_string()) {
        body["doc_name"] = doc_name.clone();
    }
    let request = match WikiRequest::from_value(body) {
        Ok(request) => request,
        Err(err) => return ToolResult::error(err.to_string()),
    };

    if !state.orchestrator.is_configured() {
        return ToolResult::error("CLICKUP_API_KEY is not configured on the server");
    }

    let job_id = match state.orchestrator.submit(request).await {
        Ok(job_id) => job_id,
        Err(err) => return ToolResult::error(err.to_string()),
    };
    info!(job_id = %job_id, "MCP create_wiki started job");

    let config = &state.config;
    let Some(view) =
        state.orchestrator.await_job(&job_id, config.wait_poll_interval, config.wait_timeout).await
    else {
        return ToolResult::error(format!("Job '{job_id}' not found"));
    };

    let mut result = json!(view);
    if !view.status.is_terminal() {
        result["warning"] = Value::from(STILL_RUNNING_WARNING);
    }
    ToolResult::json(&result)
}

async fn check_wiki_status(state: &ApiState, arguments: &Value) -> ToolResult {
    let job_id = arguments.get("job_id").and_then(Value::as_str).unwrap_or_default();
    if job_id.is_empty() {
        return ToolResult::error("Missing required parameter: job_id");
    }
    match state.orchestrator.get(job_id).await {
        Some(view) => ToolResult::json(&json!(view)),
        None => ToolResult::error(format!("Job '{job_id}' not found")),
    }
}
