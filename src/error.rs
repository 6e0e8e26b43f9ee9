//! Error types for the cache server
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
/// Unified error type for the cache and its HTTP front end.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key absent, or found expired on access
    #[error("Key not found")]
    NotFound,

    /// Encoded entry is larger than a whole segment arena
    #[error("Entry of {size} bytes exceeds segment capacity of {capacity} bytes")]
    OversizedEntry { size: usize, capacity: usize },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound => StatusCode::NOT_FOUND,
            CacheError::OversizedEntry { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (CacheError::NotFound, StatusCode::NOT_FOUND),
            (
                CacheError::OversizedEntry {
                    size: 10,
                    capacity: 5,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                CacheError::InvalidRequest("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_oversized_message() {
        let error = CacheError::OversizedEntry {
            size: 3000,
            capacity: 2048,
        };
        assert_eq!(
            error.to_string(),
            "Entry of 3000 bytes exceeds segment capacity of 2048 bytes"
        );
    }
}
