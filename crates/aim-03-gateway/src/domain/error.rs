//! Gateway error types and the JSON error envelope.
//!
//! Every error leaves the gateway as
//! `{"error": {"code": "<machine_code>", "message": "<text>"}}`.

use aim_02_dispatcher::DispatchError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::config::ConfigError;
use crate::registry::RegistryError;

/// Machine-readable error codes
pub mod codes {
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const REPLAYED_NONCE: &str = "replayed_nonce";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const TICKET_NOT_FOUND: &str = "ticket_not_found";
    pub const NOT_COMPLETED: &str = "not_completed";
    pub const BAD_REQUEST: &str = "bad_request";
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    pub const SHUT_DOWN: &str = "shut_down";
    pub const WAIT_TIMED_OUT: &str = "wait_timed_out";
    pub const JOB_FAILED: &str = "job_failed";
    pub const INTERNAL: &str = "internal";
}

/// An HTTP-facing error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Response status
    pub status: StatusCode,
    /// Machine-readable code
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
}

#[derive(Serialize)]
struct Envelope<'a> {
    error: EnvelopeBody<'a>,
}

#[derive(Serialize)]
struct EnvelopeBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 401 - signature missing or wrong
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::UNAUTHENTICATED, message)
    }

    /// 401 - nonce already used by this sender
    pub fn replayed_nonce() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::REPLAYED_NONCE,
            "nonce has already been used by this sender",
        )
    }

    /// 403
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message)
    }

    /// 404
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    /// 400
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message)
    }

    /// 413
    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            codes::PAYLOAD_TOO_LARGE,
            format!("request body exceeds {limit} bytes"),
        )
    }

    /// 500 - the job ran and reported failure
    pub fn job_failed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, codes::JOB_FAILED, message)
    }

    /// 500
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.status.as_u16(), self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope {
            error: EnvelopeBody {
                code: self.code,
                message: &self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::ShutDown => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, codes::SHUT_DOWN, message)
            }
            DispatchError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, codes::TICKET_NOT_FOUND, message)
            }
            DispatchError::Unauthorized(_) => Self::forbidden(message),
            DispatchError::NotCompleted(_) => {
                Self::new(StatusCode::BAD_REQUEST, codes::NOT_COMPLETED, message)
            }
            DispatchError::WaitTimedOut(_) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, codes::WAIT_TIMED_OUT, message)
            }
            DispatchError::Lost(_) => Self::internal(message),
        }
    }
}

/// Gateway startup and serving errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Endpoint registration error
    #[error("endpoint registration error: {0}")]
    Registry(#[from] RegistryError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server terminated with an I/O error
    #[error("server error: {0}")]
    Serve(String),
}
