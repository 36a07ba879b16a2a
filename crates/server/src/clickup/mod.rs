// Remote document API.
//
// `DocumentApi` is the seam between the job engine and ClickUp: the
// production implementation is `ClickUpClient`, tests substitute fakes.

pub mod client;
pub mod retry;
pub mod truncate;

use std::{future::Future, pin::Pin};

use serde_json::Value;

pub use client::{ClickUpClient, ClientSettings};
pub use retry::RetryPolicy;
pub use truncate::{truncate_content, TRUNCATION_NOTICE};

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// A workspace (team) visible to the configured API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

/// Arguments of a page-creation call.
#[derive(Debug, Clone, Copy)]
pub struct NewPage<'a> {
    pub workspace_id: &'a str,
    pub doc_id: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub parent_page_id: Option<&'a str>,
}

/// Operations the job engine needs from the remote document API.
/// Boxed futures keep the trait object-safe for `Arc<dyn DocumentApi>`.
pub trait DocumentApi: Send + Sync {
    fn list_workspaces<'a>(&'a self) -> ApiFuture<'a, Vec<Workspace>>;

    /// Create a document inside a space; returns the new document id.
    fn create_document<'a>(
        &'a self,
        workspace_id: &'a str,
        name: &'a str,
        space_id: &'a str,
    ) -> ApiFuture<'a, String>;

    /// Create one page; returns the new page id.
    fn create_page<'a>(&'a self, page: NewPage<'a>) -> ApiFuture<'a, String>;

    /// Fetch a task's raw JSON.
    fn get_task<'a>(&'a self, task_id: &'a str) -> ApiFuture<'a, Value>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status { endpoint: String, status: u16, body: String },
    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

/// Statuses worth another attempt after a backoff.
pub const RETRYABLE_STATUSES: [u16; 4] = [429, 500, 502, 503];

impl ClientError {
    /// Connection-level failures and rate-limit / gateway statuses.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            Self::Decode { .. } => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ClientError {
        ClientError::Status { endpoint: "/x".into(), status: code, body: String::new() }
    }

    #[test]
    fn rate_limit_and_gateway_errors_are_retryable() {
        for code in [429, 500, 502, 503] {
            assert!(status(code).is_retryable(), "{code} should be retryable");
        }
    }

    #[test]
    fn other_statuses_are_fatal() {
        for code in [400, 401, 403, 404, 504] {
            assert!(!status(code).is_retryable(), "{code} should be fatal");
        }
        let decode = ClientError::Decode { endpoint: "/x".into(), message: "no id".into() };
        assert!(!decode.is_retryable());
    }

    #[test]
    fn status_error_message_names_endpoint() {
        let err = ClientError::Status {
            endpoint: "/api/v3/workspaces/1/docs".into(),
            status: 400,
            body: "{\"err\":\"bad\"}".into(),
        };
        assert_eq!(
            err.to_string(),
            "/api/v3/workspaces/1/docs returned HTTP 400: {\"err\":\"bad\"}"
        );
        assert_eq!(err.status(), Some(400));
    }
}
