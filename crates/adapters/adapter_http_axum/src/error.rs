//! HTTP error response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use fitbridge_domain::error::FitBridgeError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`FitBridgeError`] to an HTTP response with appropriate status code.
pub struct ApiError(FitBridgeError);

impl From<FitBridgeError> for ApiError {
    fn from(err: FitBridgeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            FitBridgeError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            FitBridgeError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            FitBridgeError::Lifecycle(err) => (StatusCode::CONFLICT, err.to_string()),
            FitBridgeError::Unsupported { .. } => (StatusCode::BAD_REQUEST, self.0.to_string()),
            FitBridgeError::Transport(err) => {
                tracing::warn!(error = %err, "transport error");
                (StatusCode::BAD_GATEWAY, "device transport error".to_string())
            }
            FitBridgeError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            FitBridgeError::Encoding(err) => {
                tracing::error!(error = %err, "encoding error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to encode activity file".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
