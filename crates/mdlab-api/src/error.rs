//! API error types with structured JSON responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use mdlab_core::{DbError, FieldError, IdentityError, IntakeError, LifecycleError};

/// Error body for everything except field validation.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Body for intake failures: one entry per offending field.
#[derive(Debug, Serialize)]
pub struct FieldErrorsBody {
    pub errors: Vec<FieldError>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Actor required: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Validation(errors) => {
                return (StatusCode::BAD_REQUEST, Json(FieldErrorsBody { errors })).into_response();
            }
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Unauthorized(detail) => (StatusCode::UNAUTHORIZED, "ACTOR_REQUIRED", detail),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::InvalidTransition(detail) => {
                (StatusCode::CONFLICT, "INVALID_TRANSITION", detail)
            }
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotFound(what) => ApiError::NotFound(what),
            IdentityError::Conflict(what) => ApiError::Conflict(what),
            IdentityError::Invalid(what) => ApiError::BadRequest(what),
            IdentityError::Database(db) => db.into(),
            exhausted @ IdentityError::AssignmentExhausted { .. } => {
                ApiError::Internal(exhausted.to_string())
            }
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Validation(errors) | IntakeError::Resolution(errors) => {
                ApiError::Validation(errors)
            }
            IntakeError::Database(db) => db.into(),
            IntakeError::Identity(identity) => identity.into(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidTransition { .. } => ApiError::InvalidTransition(err.to_string()),
            LifecycleError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
            LifecycleError::UnknownActor(_) => ApiError::Unauthorized(err.to_string()),
            LifecycleError::NotFound(what) => ApiError::NotFound(what),
            LifecycleError::Database(db) => db.into(),
            LifecycleError::Identity(identity) => identity.into(),
        }
    }
}

/// Unreadable or non-JSON bodies are reported on the `body` field.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![FieldError::new(
            "body",
            serde_json::Value::Null,
            rejection.body_text(),
        )])
    }
}

impl<T> From<std::sync::PoisonError<T>> for ApiError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        ApiError::Internal("database lock poisoned".into())
    }
}
