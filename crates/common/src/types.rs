// Core domain types shared across all Gaia crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Title used for a newly created document when the request names none.
pub const DEFAULT_DOC_NAME: &str = "Wiki";

/// One node of the requested page tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSpec {
    pub title: String,
    /// Markdown body. May be empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<PageSpec>,
}

impl PageSpec {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { title: title.into(), content: content.into(), children: Vec::new() }
    }

    pub fn with_children(mut self, children: Vec<PageSpec>) -> Self {
        self.children = children;
        self
    }

    /// Number of nodes in this subtree, counting `self`.
    pub fn node_count(&self) -> usize {
        1 + count_nodes(&self.children)
    }
}

/// Number of nodes in a forest of pages, counting every level.
pub fn count_nodes(pages: &[PageSpec]) -> usize {
    pages.iter().map(PageSpec::node_count).sum()
}

/// Where the wiki should land in the remote document API.
///
/// Explicit identifier fields always take precedence over identifiers parsed
/// out of `url`; see [`crate::location`] for the resolution rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "TargetRepr")]
pub struct TargetLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_page_id: Option<String>,
}

impl TargetLocation {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self { url: Some(url.into()), ..Self::default() }
    }
}

/// Agents send the target either as an object or as a bare URL string.
#[derive(Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    Url(String),
    Fields(TargetFields),
}

#[derive(Deserialize)]
struct TargetFields {
    #[serde(default, deserialize_with = "opt_identifier")]
    url: Option<String>,
    #[serde(default, deserialize_with = "opt_identifier")]
    workspace_id: Option<String>,
    #[serde(default, deserialize_with = "opt_identifier")]
    space_id: Option<String>,
    #[serde(default, deserialize_with = "opt_identifier")]
    doc_id: Option<String>,
    #[serde(default, deserialize_with = "opt_identifier")]
    parent_page_id: Option<String>,
}

impl From<TargetRepr> for TargetLocation {
    fn from(repr: TargetRepr) -> Self {
        match repr {
            TargetRepr::Url(url) => {
                let url = url.trim();
                Self { url: (!url.is_empty()).then(|| url.to_string()), ..Self::default() }
            }
            TargetRepr::Fields(fields) => Self {
                url: fields.url,
                workspace_id: fields.workspace_id,
                space_id: fields.space_id,
                doc_id: fields.doc_id,
                parent_page_id: fields.parent_page_id,
            },
        }
    }
}

/// Canonical wiki-creation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WikiRequest {
    #[serde(default = "default_doc_name")]
    pub doc_name: String,
    pub target: TargetLocation,
    pub pages: Vec<PageSpec>,
}

impl WikiRequest {
    /// Full node count of the page tree.
    pub fn total_pages(&self) -> usize {
        count_nodes(&self.pages)
    }
}

fn default_doc_name() -> String {
    DEFAULT_DOC_NAME.to_string()
}

// ── Job reporting ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    #[default]
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

impl PageStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
        }
    }
}

/// Upload outcome of one page, mirroring the shape of the input tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageResult {
    pub title: String,
    /// Remote page id; empty until creation succeeds.
    #[serde(rename = "clickup_page_id", default)]
    pub remote_id: String,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub children: Vec<PageResult>,
}

impl PageResult {
    /// Build an all-`pending` result tree with the same shape as `pages`.
    pub fn pending_tree(pages: &[PageSpec]) -> Vec<PageResult> {
        pages
            .iter()
            .map(|page| PageResult {
                title: page.title.clone(),
                remote_id: String::new(),
                status: PageStatus::Pending,
                error: String::new(),
                children: Self::pending_tree(&page.children),
            })
            .collect()
    }

    /// Nodes in this subtree excluding `self`.
    pub fn descendant_count(&self) -> usize {
        self.children.iter().map(|child| 1 + child.descendant_count()).sum()
    }
}

/// Externally visible snapshot of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default)]
    pub total_pages: usize,
    #[serde(default)]
    pub uploaded: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub pages: Vec<PageResult>,
    #[serde(default)]
    pub error: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Immediate acknowledgement returned when a job is queued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WikiAccepted {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

impl WikiAccepted {
    pub fn queued(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            message: "Wiki creation job queued".to_string(),
        }
    }
}

// ── Serde helpers ──────────────────────────────────────────────────

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identifiers arrive as strings or bare numbers; blanks count as absent.
fn opt_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let id = match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a string identifier, found {other}"
            )))
        }
    };
    Ok(id.filter(|s| !s.is_empty()))
}
