//! API error types mapped to the wire envelope.
//!
//! Every failure response body is `{"retcode": -1, "errorMsg": "…"}`;
//! validation failures are HTTP 400, storage faults HTTP 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type that implements `IntoResponse`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request: unparseable JSON, missing field, wrong field
    /// type, unknown index kind (400).
    BadRequest(String),
    /// Storage or index fault the client may retry (500).
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = axum::Json(json!({ "retcode": -1, "errorMsg": message }));
        (status, body).into_response()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::InvalidInput => ApiError::BadRequest(e.to_string()),
            _ => {
                tracing::error!("storage fault: {e}");
                ApiError::Internal(e.to_string())
            }
        }
    }
}
