// ClickUp REST client.
//
// v2 endpoints for discovery (teams, tasks), v3 for docs and pages.
// POSTs go through the retry policy; GETs are single-shot.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{
    truncate::truncate_content, ApiFuture, ClientError, DocumentApi, NewPage, RetryPolicy,
    Workspace,
};
use crate::config::ServerConfig;

/// Error bodies are kept to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Connection settings for [`ClickUpClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub max_content_size: usize,
}

impl ClientSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            base_url: config.clickup_api_base.clone(),
            retry: RetryPolicy::new(config.api_retries, config.api_retry_base_delay),
            timeout: config.api_timeout,
            max_content_size: config.max_content_size,
        }
    }
}

pub struct ClickUpClient {
    http: reqwest::Client,
    settings: ClientSettings,
}

impl ClickUpClient {
    pub fn new(api_key: &str, settings: ClientSettings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(api_key).context("API key is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let url = self.url(path);
        debug!(endpoint = %path, "GET");
        send(self.http.get(&url), path).await
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, ClientError> {
        let url = self.url(path);
        debug!(endpoint = %path, "POST");
        self.settings.retry.run(path, || send(self.http.post(&url).json(payload), path)).await
    }
}

async fn send(request: reqwest::RequestBuilder, endpoint: &str) -> Result<Value, ClientError> {
    let response = request
        .send()
        .await
        .map_err(|source| ClientError::Transport { endpoint: endpoint.to_string(), source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| ClientError::Transport { endpoint: endpoint.to_string(), source })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|err| ClientError::Decode {
        endpoint: endpoint.to_string(),
        message: format!("invalid JSON body: {err}"),
    })
}

/// Ids come back as strings or numbers depending on the endpoint.
fn id_field(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn required_id(value: &Value, endpoint: &str) -> Result<String, ClientError> {
    id_field(value).ok_or_else(|| ClientError::Decode {
        endpoint: endpoint.to_string(),
        message: "response has no id".to_string(),
    })
}

fn parse_workspaces(body: &Value) -> Vec<Workspace> {
    body.get("teams")
        .and_then(Value::as_array)
        .map(|teams| {
            teams
                .iter()
                .filter_map(|team| {
                    Some(Workspace {
                        id: id_field(team)?,
                        name: team
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

impl DocumentApi for ClickUpClient {
    fn list_workspaces<'a>(&'a self) -> ApiFuture<'a, Vec<Workspace>> {
        Box::pin(async move {
            let body = self.get_json("/api/v2/team").await?;
            Ok(parse_workspaces(&body))
        })
    }

    fn create_document<'a>(
        &'a self,
        workspace_id: &'a str,
        name: &'a str,
        space_id: &'a str,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let path = format!("/api/v3/workspaces/{workspace_id}/docs");
            info!(workspace_id, doc_name = name, "creating document");
            let payload = json!({ "name": name, "parent": { "id": space_id, "type": 4 } });
            let body = self.post_json(&path, &payload).await?;
            let doc_id = required_id(&body, &path)?;
            info!(doc_id = %doc_id, "document created");
            Ok(doc_id)
        })
    }

    fn create_page<'a>(&'a self, page: NewPage<'a>) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let path =
                format!("/api/v3/workspaces/{}/docs/{}/pages", page.workspace_id, page.doc_id);
            let content = truncate_content(page.content, self.settings.max_content_size);

            let mut payload = Map::new();
            payload.insert("name".into(), Value::from(page.title));
            payload.insert("content".into(), Value::from(content.as_ref()));
            if let Some(parent) = page.parent_page_id.filter(|id| !id.is_empty()) {
                payload.insert("parent_page_id".into(), Value::from(parent));
            }

            let body = self.post_json(&path, &Value::Object(payload)).await?;
            required_id(&body, &path)
        })
    }

    fn get_task<'a>(&'a self, task_id: &'a str) -> ApiFuture<'a, Value> {
        Box::pin(async move { self.get_json(&format!("/api/v2/task/{task_id}")).await })
    }
}
