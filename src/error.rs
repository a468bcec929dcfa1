// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{
    db::StoreError, generation::GenerationError, quiz::QuizError, roster::RosterError,
};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error (details logged, never returned)
    InternalServerError(String),

    // 500 with the downstream message (generation service failures)
    Upstream(String),

    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., deleting a user who has submissions)
    Conflict(String),

    // 503 Service Unavailable (missing configuration, unreachable store)
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            StoreError::HasSubmissions { .. } => AppError::Conflict(
                "This user has already submitted a quiz and cannot be deleted. Remove their submissions first."
                    .to_string(),
            ),
            StoreError::DuplicateSubmission { .. } => {
                AppError::Conflict("This quiz has already been submitted".to_string())
            }
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Unavailable(msg) => {
                tracing::error!("Data store unavailable: {}", msg);
                AppError::ServiceUnavailable(
                    "The data store is unreachable. Please try again.".to_string(),
                )
            }
            StoreError::Database(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<QuizError> for AppError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::Store(e) => AppError::from(e),
            QuizError::UnknownUser(_) | QuizError::UnknownQuestion(_) => {
                AppError::NotFound(err.to_string())
            }
            QuizError::InvalidTransition { .. } | QuizError::AlreadyGraded => {
                AppError::Conflict(err.to_string())
            }
            QuizError::GuestsDisabled
            | QuizError::InvalidIdentity
            | QuizError::InvalidOption(_)
            | QuizError::NoQuestions
            | QuizError::Incomplete { .. }
            | QuizError::NotPassed => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<RosterError> for AppError {
    fn from(err: RosterError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
