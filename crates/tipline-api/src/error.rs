//! The error translator: every failure leaving a handler becomes the
//! uniform `{"error": <name>, "message": <description>}` envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    MethodNotAllowed,
    Conflict(String),
    /// Reply payload arrived unencrypted. This rejection uses a bare
    /// message body instead of the envelope.
    Unencrypted,
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, name, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "Bad Request", message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, "Forbidden", message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "Not Found", message),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed",
                "method not allowed".to_string(),
            ),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "Conflict", message),
            ApiError::Unencrypted => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"message": "You must encrypt replies client side"})),
                )
                    .into_response();
            }
            ApiError::Internal(err) => {
                error!(error = ?err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "an unexpected error occurred".to_string(),
                )
            }
        };
        (status, Json(json!({"error": name, "message": message}))).into_response()
    }
}

/// Parses an already-syntax-checked body into a typed request. A body
/// that does not fit the endpoint's schema gets the endpoint's own
/// invalid-JSON message.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
    rejection_message: &str,
) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|_| ApiError::BadRequest(rejection_message.to_string()))
}
