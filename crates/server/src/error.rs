// Error envelope shared by every JSON endpoint, plus the per-request id
// that ties log lines to responses.
//
//   { "error": { "code", "message", "retryable", "request_id", "details" } }

use std::future::Future;

use axum::{
    http::{header::HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    static REQUEST_ID: String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailed,
    AuthInvalidSecret,
    AuthInvalidToken,
    NotFound,
    PayloadTooLarge,
    /// The ClickUp API key is missing, so no job can run.
    ServiceUnconfigured,
    InternalError,
}

impl ErrorCode {
    pub const fn status(self) -> StatusCode {
        match self {
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::AuthInvalidSecret | Self::AuthInvalidToken => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ServiceUnconfigured | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Only unexpected failures are worth retrying; a missing key stays missing.
    pub const fn retryable(self) -> bool {
        matches!(self, Self::InternalError)
    }

    const fn default_message(self) -> &'static str {
        match self {
            Self::ValidationFailed => "request validation failed",
            Self::AuthInvalidSecret => "invalid or missing X-Api-Secret header",
            Self::AuthInvalidToken => "invalid authentication token",
            Self::NotFound => "requested resource not found",
            Self::PayloadTooLarge => "payload exceeds maximum allowed size",
            Self::ServiceUnconfigured => "CLICKUP_API_KEY is not configured on the server",
            Self::InternalError => "internal server error",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Value,
}

#[derive(Serialize)]
struct Envelope<'a> {
    error: EnvelopeBody<'a>,
}

#[derive(Serialize)]
struct EnvelopeBody<'a> {
    code: ErrorCode,
    message: &'a str,
    retryable: bool,
    request_id: Option<String>,
    details: &'a Value,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: json!({}) }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = current_request_id();
        let envelope = Envelope {
            error: EnvelopeBody {
                code: self.code,
                message: &self.message,
                retryable: self.code.retryable(),
                request_id: request_id.clone(),
                details: &self.details,
            },
        };

        let mut response = (self.code.status(), Json(envelope)).into_response();
        if let Some(request_id) = request_id {
            set_request_id_header(&mut response, &request_id);
        }
        response
    }
}

/// Run `future` with `request_id` visible to [`current_request_id`].
pub async fn scope_request_id<F: Future>(request_id: String, future: F) -> F::Output {
    REQUEST_ID.scope(request_id, future).await
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}

/// Caller-supplied `x-request-id`, or a fresh UUID.
pub fn incoming_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToOwned::to_owned)
}

pub fn set_request_id_header(response: &mut Response, request_id: &str) {
    if let Ok(header) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header);
    }
}
