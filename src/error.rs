//! Error types for the page cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the page cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Prefetch probe failed the nonce or privilege check
    #[error("Prefetch rejected: {0}")]
    PrefetchRejected(String),

    /// The backing store refused an operation
    #[error("Store error: {0}")]
    Store(String),

    /// Settings document could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::PrefetchRejected(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            CacheError::Store(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            CacheError::Settings(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the page cache.
pub type Result<T> = std::result::Result<T, CacheError>;
