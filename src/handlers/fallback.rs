use axum::{
    http::Uri,
    response::{IntoResponse, Response},
};

use crate::core::error::{ApiError, AttendanceError};

/// JSON 404 for every unmatched route
pub async fn fallback_handler(uri: Uri) -> Response {
    ApiError::from(AttendanceError::NotFound(format!("Route {}", uri.path()))).into_response()
}
