use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::{ApiError, ErrorCode};

pub const API_SECRET_HEADER: &str = "x-api-secret";

/// Require `X-Api-Secret` to match the configured shared secret.
/// Only layered onto the REST routes when a secret is configured.
pub async fn require_api_secret(
    State(expected): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request.headers().get(API_SECRET_HEADER).and_then(|value| value.to_str().ok());

    if provided != Some(expected.as_ref()) {
        return ApiError::from_code(ErrorCode::AuthInvalidSecret).into_response();
    }

    next.run(request).await
}
