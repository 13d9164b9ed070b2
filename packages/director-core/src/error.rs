//! Centralized error types for the director core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the director server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum DirectorError {
    /// A referenced camera is not registered with the ingress adapter.
    #[error("camera not found: {0}")]
    CameraNotFound(String),

    /// The media room could not be joined, or dropped an active connection.
    #[error("ingress error: {0}")]
    Ingress(String),

    /// An analyzer call failed or exceeded its deadline.
    #[error("analyzer error: {0}")]
    Analyzer(String),

    /// The TTS backend failed to synthesize narration audio.
    #[error("narration error: {0}")]
    Narration(String),

    /// Client sent an invalid or malformed request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A manual override referenced a camera or state that is not valid right now.
    #[error("invalid override: {0}")]
    InvalidOverride(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Server configuration error (missing or out-of-range settings).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl DirectorError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CameraNotFound(_) => "camera_not_found",
            Self::Ingress(_) => "ingress_error",
            Self::Analyzer(_) => "analyzer_error",
            Self::Narration(_) => "narration_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidOverride(_) => "invalid_override",
            Self::Internal(_) => "internal_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CameraNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) | Self::InvalidOverride(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type DirectorResult<T> = Result<T, DirectorError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for DirectorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
