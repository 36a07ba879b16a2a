// Input validation extractors.
//
// - `ValidatedJson<T>`: content-type check + serde, failing with the JSON
//   error envelope instead of axum's plain-text rejections.
// - `ValidWiki`: a body normalized and validated as a `WikiRequest`.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gaia_common::request::RequestError;
use gaia_common::types::WikiRequest;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{ApiError, ErrorCode};

/// Maximum REST request body in bytes (2 MiB).
pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

// ── ValidatedJson extractor ────────────────────────────────────────

/// A JSON body extractor that returns a structured [`ApiError`] on failure.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidatedJson(value)),
            Err(rejection) => Err(json_rejection_error(&rejection).into_response()),
        }
    }
}

fn json_rejection_error(rejection: &JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::from_code(ErrorCode::PayloadTooLarge)
            .with_details(json!({ "limit_bytes": MAX_REQUEST_BODY_BYTES }));
    }

    let (message, kind) = match rejection {
        JsonRejection::JsonDataError(e) => (format!("invalid JSON payload: {e}"), "data_error"),
        JsonRejection::JsonSyntaxError(e) => (format!("malformed JSON: {e}"), "syntax_error"),
        JsonRejection::MissingJsonContentType(_) => {
            ("expected Content-Type: application/json".to_string(), "missing_content_type")
        }
        JsonRejection::BytesRejection(e) => (format!("request body error: {e}"), "body_error"),
        other => (format!("request body error: {other}"), "unknown"),
    };
    ApiError::new(ErrorCode::ValidationFailed, message).with_details(json!({ "kind": kind }))
}

// ── Wiki request extractor ─────────────────────────────────────────

/// A JSON body normalized and validated into a [`WikiRequest`].
pub struct ValidWiki(pub WikiRequest);

impl<S> FromRequest<S> for ValidWiki
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ValidatedJson(value) = ValidatedJson::<Value>::from_request(req, state).await?;
        WikiRequest::from_value(value)
            .map(ValidWiki)
            .map_err(|err| request_error(&err).into_response())
    }
}

/// Map a request validation failure onto the error envelope.
pub fn request_error(err: &RequestError) -> ApiError {
    let details = match err {
        RequestError::Length { field, len, max } => {
            json!({ "kind": "length", "field": field, "len": len, "max": max })
        }
        RequestError::NoPages => json!({ "kind": "length", "field": "pages", "len": 0, "min": 1 }),
        RequestError::NotAnObject => json!({ "kind": "type" }),
        RequestError::Malformed(_) => json!({ "kind": "schema" }),
    };
    ApiError::new(ErrorCode::ValidationFailed, err.to_string()).with_details(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::post, Router};
    use tower::ServiceExt;

    async fn titles(ValidWiki(request): ValidWiki) -> String {
        request.pages.iter().map(|p| p.title.as_str()).collect::<Vec<_>>().join(",")
    }

    fn app() -> Router {
        Router::new().route("/wiki", post(titles))
    }

    async fn send(body: &str, content_type: &str) -> (StatusCode, Value, String) {
        let response = app()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/wiki")
                    .header("content-type", content_type)
                    .body(Body::from(body.to_string()))
                    .expect("request should build"),
            )
            .await
            .expect("request should return a response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let text = String::from_utf8_lossy(&bytes).to_string();
        (status, serde_json::from_str(&text).unwrap_or(Value::Null), text)
    }

    #[tokio::test]
    async fn accepts_valid_wiki() {
        let (status, _, text) = send(
            r#"{"target": {"space_id": "1"}, "pages": [{"title": "A"}, {"title": "B"}]}"#,
            "application/json",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "A,B");
    }

    #[tokio::test]
    async fn reports_field_path_for_invalid_title() {
        let (status, body, _) = send(
            r#"{"target": {}, "pages": [{"title": "A", "children": [{"title": ""}]}]}"#,
            "application/json",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(body["error"]["details"]["field"], "pages[0].children[0].title");
    }

    #[tokio::test]
    async fn malformed_json_uses_error_envelope() {
        let (status, body, _) = send("{not json", "application/json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["kind"], "syntax_error");
    }

    #[tokio::test]
    async fn missing_content_type_is_rejected() {
        let (status, body, _) = send("{}", "text/plain").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["kind"], "missing_content_type");
    }
}
