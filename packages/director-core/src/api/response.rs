//! HTTP response envelope for consistent API responses.
//!
//! Every control API response carries the same `{success, data?, error?,
//! timestamp}` shape, success or failure alike.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::utils::now_seconds;

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: f64,
}

/// Standard API success response with JSON data, HTTP 200.
pub fn api_success<T: Serialize>(data: T) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: now_seconds(),
        }),
    )
}

/// Simple success response with no payload, e.g. `/reset`.
pub fn api_ok() -> impl IntoResponse {
    api_success(serde_json::json!({}))
}

/// Standard API error response with a status code and message.
pub fn api_error(status: StatusCode, message: impl std::fmt::Display) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: now_seconds(),
        }),
    )
}
