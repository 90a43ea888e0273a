//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting.

use crate::executor::CliError;
use crate::gateway::GatewayError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// All errors that can occur in the application are represented by this enum.
/// Each variant implements automatic conversion to HTTP responses via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested file or resource was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request parameters are invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error occurred talking to the gateway
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Error occurred running the gateway CLI
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// Error occurred during settings persistence
    #[error("Persistence error: {0}")]
    Persistence(#[from] crate::state::PersistenceError),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(GatewayError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Gateway(GatewayError::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Cli(CliError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Cli(_) => StatusCode::BAD_GATEWAY,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_map_to_upstream_statuses() {
        let timeout = AppError::from(GatewayError::Timeout {
            method: "health".to_string(),
            secs: 15,
        });
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            AppError::from(GatewayError::ConnectionClosed).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(GatewayError::InvalidUrl("x".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_response_body_shape() {
        let response = AppError::NotFound("MEMORY.md".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
