//! HTTP error mapping for engine errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use dripline_domain::error::DriplineError;

/// Wrapper that renders a [`DriplineError`] as an HTTP response.
pub struct ApiError(pub DriplineError);

impl From<DriplineError> for ApiError {
    fn from(err: DriplineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DriplineError::NotFound(_) => StatusCode::NOT_FOUND,
            DriplineError::Validation(_) | DriplineError::Condition(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DriplineError::Structural(_)
            | DriplineError::Action(_)
            | DriplineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
