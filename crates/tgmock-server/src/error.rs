//! Error types for the mock server.
//!
//! [`ApiError`] covers every non-success reply the mock sends on the wire,
//! whether it is a routing miss or an injected fault. [`ServerError`] covers
//! failures of the library itself (bad configuration, bind failure).

use std::net::SocketAddr;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Library error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration rejected by validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Other I/O failure on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// A Bot API error reply.
///
/// Rendered as `{"ok": false, "error_code": <status>, "description": ...}`
/// with the HTTP status equal to `error_code`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Path does not start with `/bot<token>/`.
    #[error("Not Found")]
    NotFound,

    /// Path matched but the method is not modelled.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// HTTP verb other than GET or POST.
    #[error("Unsupported method ({0})")]
    UnsupportedVerb(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// One-shot rate limit reply.
    #[error("Too Many Requests: retry after {retry_after}")]
    TooManyRequests { retry_after: u64 },

    /// Status forced by configuration.
    #[error("Forced error")]
    Forced(u16),

    /// Random failure.
    #[error("Internal Server Error")]
    Internal,
}

impl ApiError {
    /// HTTP status (and `error_code`) for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound | ApiError::MethodNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedVerb(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Forced(code) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this reply was injected on purpose rather than caused by the request.
    pub fn is_injected(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized
                | ApiError::TooManyRequests { .. }
                | ApiError::Forced(_)
                | ApiError::Internal
        )
    }
}

/// Error envelope body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error_code: u16,
    pub description: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let description = self.to_string();

        if self.is_injected() {
            tracing::debug!(status = %status.as_u16(), %description, "Injected error");
        } else {
            tracing::warn!(status = %status.as_u16(), %description, "Routing error");
        }

        let body = ErrorBody {
            ok: false,
            error_code: status.as_u16(),
            description,
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::TooManyRequests { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}
