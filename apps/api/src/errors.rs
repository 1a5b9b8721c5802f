use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::calendar::DateKeyParseError;
use crate::store::StoreError;

/// Errors raised by the quiz core.
///
/// A malformed answer is not an error: it is scored as incorrect.
/// Data-integrity problems are warnings, see `schedule::manager::IntegrityWarning`.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("No question scheduled for {date_key}: {reason}")]
    NotScheduled { date_key: String, reason: String },

    #[error("Write to {resource} lost {attempts} consecutive races")]
    ConflictRetryExhausted { resource: String, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    InvalidDateKey(#[from] DateKeyParseError),

    #[error("Invalid period key '{0}'")]
    InvalidPeriodKey(String),

    #[error("Invalid question {question_id}: {reason}")]
    InvalidQuestion { question_id: String, reason: String },

    #[error("Unknown question {0}")]
    UnknownQuestion(String),
}

impl QuizError {
    pub fn not_scheduled(date_key: impl ToString, reason: impl Into<String>) -> Self {
        QuizError::NotScheduled {
            date_key: date_key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "An identity header (x-player-id, x-guest-token or x-admin-id) is required".to_string(),
            ),
            AppError::Quiz(e) => match e {
                QuizError::NotScheduled { .. } => {
                    (StatusCode::NOT_FOUND, "NOT_SCHEDULED", e.to_string())
                }
                QuizError::InvalidDateKey(_)
                | QuizError::InvalidPeriodKey(_)
                | QuizError::InvalidQuestion { .. }
                | QuizError::UnknownQuestion(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                QuizError::ConflictRetryExhausted { .. } => {
                    tracing::warn!("{e}");
                    (
                        StatusCode::CONFLICT,
                        "CONFLICT_RETRY_EXHAUSTED",
                        "Too many concurrent updates, please retry".to_string(),
                    )
                }
                QuizError::Store(err) => {
                    tracing::error!("Store error: {err}");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORE_UNAVAILABLE",
                        "The quiz store is unavailable, please retry".to_string(),
                    )
                }
            },
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_quiz_errors_map_to_statuses() {
        assert_eq!(
            status_of(QuizError::not_scheduled("2024-03-01", "nothing").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                QuizError::ConflictRetryExhausted {
                    resource: "progress".into(),
                    attempts: 5
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(QuizError::Store(StoreError::Unavailable("down".into())).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(QuizError::InvalidPeriodKey("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unauthorized() {
        assert_eq!(status_of(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
    }
}
