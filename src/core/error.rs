// Centralized error handling for the attendance service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Failures raised by the session authority, the ledger and the identity store.
///
/// None of these are retried; each one ends the request and is reported with
/// enough detail for the caller to act on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttendanceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Session {0} has expired, ask the teacher to restart it")]
    Expired(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Batch write failed, nothing was recorded: {0}")]
    BatchFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AttendanceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::Forbidden(_) => StatusCode::FORBIDDEN,
            AttendanceError::Expired(_) => StatusCode::GONE,
            AttendanceError::Conflict(_) => StatusCode::CONFLICT,
            AttendanceError::BatchFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AttendanceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Too many login attempts, try again later")]
    RateLimited,

    #[error(transparent)]
    Domain(#[from] AttendanceError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use crate::models::payloads::ErrorResponse;

        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Domain(e) => e.status_code(),
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details stay in the logs
        let error = match &self {
            ApiError::InternalError(_) | ApiError::Domain(AttendanceError::Storage(_)) => {
                tracing::error!(error = %self, "Request failed");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error,
            }),
        )
            .into_response()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field format: {0}")]
    InvalidFormat(String),

    #[error("Field out of range: {0}")]
    OutOfRange(String),

    #[error("Field too long: {field} exceeds {max} characters")]
    TooLong { field: String, max: usize },
}
