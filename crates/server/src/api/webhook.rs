// Automation webhook ingestion.
//
// Payload-location heuristics for webhook bodies whose shape is not fixed:
// the wiki JSON may be the body itself, sit inside a text field, arrive as a
// `payload` query parameter, or only exist in the description of the task
// that fired the automation.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use gaia_common::{
    salvage::{extract, find_in_object},
    types::WikiRequest,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::ApiState;
use crate::{
    clickup::DocumentApi,
    error::{ApiError, ErrorCode},
};

const TEST_ACK: &str =
    "Webhook received successfully. Send a task with wiki JSON in the description to create pages.";
const NO_PAYLOAD_GUIDANCE: &str = "No wiki JSON payload found. Ensure the task description \
    contains JSON like: {\"doc_name\": \"...\", \"target\": {\"url\": \"...\"}, \"pages\": [...]}";
const MIN_RAW_BODY_CHARS: usize = 10;
const MIN_TASK_ID_CHARS: usize = 5;
const TASK_TEXT_FIELDS: [&str; 3] = ["text_content", "description", "markdown_description"];
const LOG_PREVIEW_CHARS: usize = 500;

pub(super) async fn clickup(
    State(state): State<ApiState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let body_text = String::from_utf8_lossy(&body);
    let preview: String = body_text.chars().take(LOG_PREVIEW_CHARS).collect();
    info!(bytes = body.len(), body = %preview, "webhook received");

    let data = webhook_data(&body_text);

    let Some(api) = state.orchestrator.api() else {
        return ApiError::from_code(ErrorCode::ServiceUnconfigured).into_response();
    };

    if is_test_ping(&body_text, &data) && !data.contains_key("pages") {
        info!("webhook test ping acknowledged");
        return Json(json!({ "status": "ok", "message": TEST_ACK })).into_response();
    }

    let located = locate_payload(&**api, &data, query.get("payload"), &body_text).await;
    let Some(payload) = located else {
        warn!("webhook carried no wiki payload");
        return Json(json!({ "status": "ignored", "message": NO_PAYLOAD_GUIDANCE })).into_response();
    };

    let request = match WikiRequest::from_value(Value::Object(payload)) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "webhook payload failed validation");
            let message = format!("Invalid wiki payload: {err}");
            return Json(json!({ "status": "error", "message": message })).into_response();
        }
    };
    let total_pages = request.total_pages();

    match state.orchestrator.submit(request).await {
        Ok(job_id) => {
            info!(job_id = %job_id, total_pages, "webhook started wiki job");
            Json(json!({
                "status": "accepted",
                "job_id": job_id,
                "total_pages": total_pages,
                "message": "Wiki creation started",
            }))
            .into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// The JSON object carried by the body: the body itself, or the first item
/// of an array body. Anything else yields an empty map.
fn webhook_data(body: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Array(items)) => match items.into_iter().next() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}

fn is_test_ping(body: &str, data: &Map<String, Value>) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty()
        || matches!(trimmed, "{}" | "[]" | "null" | "test")
        || data.get("event").and_then(Value::as_str) == Some("test")
}

/// Search for the wiki JSON, first hit wins.
async fn locate_payload(
    api: &dyn DocumentApi,
    data: &Map<String, Value>,
    payload_param: Option<&String>,
    body: &str,
) -> Option<Map<String, Value>> {
    if let Some(found) = find_in_object(data) {
        info!(source = "body", "found wiki payload");
        return Some(found);
    }

    if let Some(param) = payload_param.filter(|param| !param.is_empty()) {
        if let Some(found) = extract(param).found() {
            info!(source = "query", "found wiki payload");
            return Some(found);
        }
    }

    if body.chars().count() >= MIN_RAW_BODY_CHARS {
        if let Some(found) = extract(body).found() {
            info!(source = "raw_body", "found wiki payload");
            return Some(found);
        }
    }

    let Some(task_id) = task_id(data) else {
        info!("no task id in webhook body");
        return None;
    };
    info!(task_id = %task_id, "fetching task description");
    payload_from_task(api, &task_id).await
}

async fn payload_from_task(api: &dyn DocumentApi, task_id: &str) -> Option<Map<String, Value>> {
    let task = match api.get_task(task_id).await {
        Ok(task) => task,
        Err(err) => {
            warn!(task_id, error = %err, "failed to fetch task");
            return None;
        }
    };

    for field in TASK_TEXT_FIELDS {
        let Some(text) = task.get(field).and_then(Value::as_str).filter(|t| !t.is_empty()) else {
            continue;
        };
        if let Some(found) = extract(text).found() {
            info!(task_id, field, "found wiki payload in task");
            return Some(found);
        }
    }

    warn!(task_id, "task text fields carried no wiki payload");
    None
}

/// Task id from the common automation body shapes, in priority order:
/// `payload.id`, `task_id`, `taskId`, `task.id`, `history_items[0].after.id`.
fn task_id(data: &Map<String, Value>) -> Option<String> {
    let nested_id = |key: &str| data.get(key).and_then(|value| value.get("id"));

    let candidates = [
        nested_id("payload"),
        data.get("task_id"),
        data.get("taskId"),
        nested_id("task"),
        data.get("history_items")
            .and_then(|items| items.get(0))
            .and_then(|item| item.get("after"))
            .and_then(|after| after.get("id")),
    ];

    candidates.into_iter().flatten().find_map(valid_task_id)
}

fn valid_task_id(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };

    let placeholder = matches!(raw.as_str(), "{}" | "null" | "undefined") || raw.starts_with("{{");
    if placeholder || raw.chars().count() < MIN_TASK_ID_CHARS {
        return None;
    }
    Some(raw)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{is_test_ping, task_id, webhook_data};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn data_is_object_or_first_array_item() {
        assert_eq!(webhook_data(r#"{"a": 1}"#), object(json!({"a": 1})));
        assert_eq!(webhook_data(r#"[{"a": 1}, {"b": 2}]"#), object(json!({"a": 1})));
        assert!(webhook_data("[1, 2]").is_empty());
        assert!(webhook_data("plain text").is_empty());
    }

    #[test]
    fn detects_test_pings() {
        for body in ["", "  ", "{}", "[]", "null", "test"] {
            assert!(is_test_ping(body, &webhook_data(body)), "{body:?}");
        }
        let body = r#"{"event": "test", "x": 1}"#;
        assert!(is_test_ping(body, &webhook_data(body)));

        let body = r#"{"event": "taskCreated"}"#;
        assert!(!is_test_ping(body, &webhook_data(body)));
    }

    #[test]
    fn task_id_sources_in_priority_order() {
        let data = object(json!({
            "payload": { "id": "86c8ce274" },
            "task_id": "fallback01",
        }));
        assert_eq!(task_id(&data).as_deref(), Some("86c8ce274"));

        let data = object(json!({ "payload": { "id": "{{Task ID}}" }, "taskId": "abcde" }));
        assert_eq!(task_id(&data).as_deref(), Some("abcde"));

        let data = object(json!({ "task": { "id": 123456789 } }));
        assert_eq!(task_id(&data).as_deref(), Some("123456789"));

        let data = object(json!({ "history_items": [{ "after": { "id": "hist12345" } }] }));
        assert_eq!(task_id(&data).as_deref(), Some("hist12345"));
    }

    #[test]
    fn placeholder_and_short_ids_are_rejected() {
        let ids = ["", "{}", "null", "undefined", "abc", "{{Task ID}}"].map(Value::from);
        for id in ids.into_iter().chain([Value::Null]) {
            let data = object(json!({ "task_id": id }));
            assert_eq!(task_id(&data), None, "{id}");
        }
    }
}
