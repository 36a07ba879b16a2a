// MCP method names, tool catalogue and tool-result shapes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const SERVER_NAME: &str = "gaia-orchestrator";

// ── Methods ────────────────────────────────────────────────────────
pub const INITIALIZE: &str = "initialize";
pub const INITIALIZED: &str = "notifications/initialized";
pub const PING: &str = "ping";
pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";

// ── Tools ──────────────────────────────────────────────────────────
pub const TOOL_CREATE_WIKI: &str = "create_wiki";
pub const TOOL_CHECK_WIKI_STATUS: &str = "check_wiki_status";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<TextContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// Pretty-printed JSON as a single text block.
    pub fn json(value: &Value) -> Self {
        Self::text(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()), false)
    }

    /// `{"error": message}` flagged as a tool error.
    pub fn error(message: impl Into<String>) -> Self {
        let body = json!({ "error": message.into() });
        Self { is_error: true, ..Self::json(&body) }
    }

    fn text(text: String, is_error: bool) -> Self {
        Self { content: vec![TextContent { kind: "text".to_string(), text }], is_error }
    }
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: TOOL_CREATE_WIKI.to_string(),
            description: "Create a structured wiki in ClickUp. Provide a ClickUp URL and a tree of \
                pages with titles and markdown content. Waits for the upload to finish and \
                returns the result."
                .to_string(),
            input_schema: create_wiki_schema(),
        },
        ToolDefinition {
            name: TOOL_CHECK_WIKI_STATUS.to_string(),
            description: "Check the status of a wiki creation job by its job_id.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "job_id": {"type": "string", "description": "Job ID returned by create_wiki."}
                },
                "required": ["job_id"]
            }),
        },
    ]
}

fn create_wiki_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "url": {
                "type": "string",
                "description": "ClickUp URL where the wiki should be created. Doc-page URL: pages \
                    nested under that page. Doc-root URL: pages at top level. Space URL: a new Doc \
                    is created. Example: https://app.clickup.com/90151997238/v/dc/2kyqmktp-35355/2kyqmktp-581535"
            },
            "doc_name": {
                "type": "string",
                "description": "Title for a new Doc (only used when the target is a Space URL).",
                "default": "Wiki"
            },
            "pages": {
                "type": "array",
                "description": "Tree of pages. Each item has 'title' (str), 'content' (markdown str) \
                    and optional 'children' (same structure).",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "content": {"type": "string"},
                        "children": {"type": "array", "items": {"type": "object"}}
                    },
                    "required": ["title", "content"]
                }
            }
        },
        "required": ["url", "pages"]
    })
}
