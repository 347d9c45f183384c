//! HTTP error type and the `{ "error": ... }` envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::FlowError;
use crate::models::ValidationError;

/// Error body returned by every failing route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Success body for routes that have no record to return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessBody {
    pub success: bool,
    pub message: String,
}

impl SuccessBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unauthorized: API key required or invalid")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Too many requests")]
    RateLimited,

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(kind: &str) -> Self {
        Self::NotFound(format!("{} not found", kind))
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => {
                tracing::warn!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized: API key required or invalid".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            AppError::Flow(e) => flow_status(e),
            AppError::Internal(e) => storage_status(e),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

fn flow_status(e: FlowError) -> (StatusCode, String) {
    let msg = e.to_string();
    match e {
        FlowError::InvalidInput(_) => {
            tracing::warn!("Validation error: {}", msg);
            (StatusCode::BAD_REQUEST, msg)
        }
        FlowError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, msg),
        // Flow already logged the failure with its context.
        _ => (StatusCode::INTERNAL_SERVER_ERROR, msg),
    }
}

/// Storage errors carry validation failures and missing parents; anything
/// else is logged in full and sanitized for the client.
fn storage_status(e: anyhow::Error) -> (StatusCode, String) {
    if let Some(validation) = e.downcast_ref::<ValidationError>() {
        tracing::warn!("Validation error: {}", validation);
        return (StatusCode::BAD_REQUEST, validation.to_string());
    }

    let msg = e.to_string();
    if msg.contains("not found") {
        tracing::warn!("Referenced record missing: {}", msg);
        return (StatusCode::NOT_FOUND, msg);
    }

    tracing::error!("Internal error: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_inside_anyhow_is_a_bad_request() {
        let err: anyhow::Error = ValidationError::Invalid("bad".to_string()).into();
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_parent_is_not_found() {
        let response = AppError::from(anyhow::anyhow!("Subject not found")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unexpected_errors_are_internal() {
        let response = AppError::from(anyhow::anyhow!("disk I/O error")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn flow_failures_map_by_kind() {
        let cases = [
            (FlowError::InvalidInput("x".to_string()), StatusCode::BAD_REQUEST),
            (FlowError::NotConfigured, StatusCode::SERVICE_UNAVAILABLE),
            (
                FlowError::SchemaViolation("x".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
