// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the request dispatcher and the HTTP front
#[derive(Error, Debug)]
pub enum ApiError {
    /// No token could be obtained, raised before any request is sent
    #[error("Authentication unavailable: no OCP token could be obtained")]
    AuthUnavailable,

    /// Non-2xx response from an OCP resource call
    #[error("OCP API error: {status} - {body}")]
    RequestFailed { status: u16, body: String },

    /// Timeout, connection failure or other transport problem
    #[error("Transport error ({kind}): {message}")]
    Transport { kind: &'static str, message: String },

    /// Success response whose body is not JSON
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Caller failed proxy authentication
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connection_failed"
        } else if e.is_request() {
            "request_error"
        } else if e.is_body() {
            "body_error"
        } else if e.is_decode() {
            "decode_error"
        } else {
            "unknown"
        };

        ApiError::Transport {
            kind,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::AuthUnavailable => (
                StatusCode::BAD_GATEWAY,
                "auth_unavailable",
                "Authentication with OCP is unavailable".to_string(),
            ),
            ApiError::RequestFailed { status, body } => {
                let status_code =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status_code, "ocp_api_error", body)
            }
            ApiError::Transport { kind, message } => {
                let status_code = if kind == "timeout" {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status_code, "transport_error", message)
            }
            ApiError::Decode(msg) => (StatusCode::BAD_GATEWAY, "decode_error", msg),
            ApiError::AuthError(msg) => (StatusCode::UNAUTHORIZED, "auth_error", msg),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type alias for dispatcher operations
pub type Result<T> = std::result::Result<T, ApiError>;
