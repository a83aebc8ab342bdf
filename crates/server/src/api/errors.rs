//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a specific HTTP status code and produces
//! a JSON response body `{"error": "message"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vecfs_core::HnswError;

/// Application-level error type that implements `IntoResponse`.
///
/// Each variant maps to an HTTP status code:
/// - `BadRequest` → 400
/// - `NotFound` → 404
/// - `Conflict` → 409
/// - `ServiceUnavailable` → 503
/// - `InsufficientStorage` → 507
/// - `Internal` → 500
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters (400).
    BadRequest(String),
    /// Vector id not found (404).
    NotFound(String),
    /// Index or vector already exists (409).
    Conflict(String),
    /// No index has been initialized (503).
    ServiceUnavailable(String),
    /// Allocation failed inside the engine (507).
    InsufficientStorage(String),
    /// Unexpected server error (500).
    Internal(String),
}

impl From<HnswError> for ApiError {
    fn from(err: HnswError) -> Self {
        let message = err.to_string();
        match err {
            HnswError::InvalidArgument(_) => ApiError::BadRequest(message),
            HnswError::VectorNotFound(_) => ApiError::NotFound(message),
            HnswError::AlreadyInitialized | HnswError::DuplicateVector(_) => {
                ApiError::Conflict(message)
            }
            HnswError::NotInitialized => ApiError::ServiceUnavailable(message),
            HnswError::OutOfMemory(_) => ApiError::InsufficientStorage(message),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!("Engine task failed: {}", err);
        ApiError::Internal("Internal error".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InsufficientStorage(msg) => (StatusCode::INSUFFICIENT_STORAGE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: HnswError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_engine_errors_map_to_status_codes() {
        assert_eq!(
            status_of(HnswError::InvalidArgument("k".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(HnswError::VectorNotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(HnswError::AlreadyInitialized), StatusCode::CONFLICT);
        assert_eq!(status_of(HnswError::DuplicateVector(1)), StatusCode::CONFLICT);
        assert_eq!(
            status_of(HnswError::NotInitialized),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(HnswError::OutOfMemory("node")),
            StatusCode::INSUFFICIENT_STORAGE
        );
    }
}
