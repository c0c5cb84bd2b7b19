// ABOUTME: API module containing the JSON and streaming HTTP handlers for partshelf.
// ABOUTME: Organized into sub-modules for conversion, browsing, libraries, downloads, and the log stream.

pub mod browse;
pub mod convert;
pub mod download;
pub mod libraries;
pub mod stream;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A JSON `{"error": ...}` response with the given status.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
