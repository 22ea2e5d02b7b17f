use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::jwt::JwtError;
use crate::users::store::StoreError;

/// Errors surfaced by handlers. Every variant maps to one status code and a
/// short message that never carries internal details.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("malformed query string: {0}")]
    MalformedQuery(String),

    #[error("email already exists")]
    DuplicateEmail,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("cannot delete yourself")]
    ForbiddenSelfDelete,

    #[error("not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(#[source] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::MalformedBody(_)
            | AppError::MalformedQuery(_)
            | AppError::DuplicateEmail => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::ForbiddenSelfDelete => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::MalformedBody(_) | AppError::MalformedQuery(_) => "BAD_REQUEST",
            AppError::DuplicateEmail => "DUPLICATE_EMAIL",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::ForbiddenSelfDelete => "FORBIDDEN_SELF_DELETE",
            AppError::NotFound => "NOT_FOUND",
            AppError::Storage(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            other => AppError::Storage(other),
        }
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Encoding(e) => AppError::Internal(anyhow::Error::new(e).context("sign token")),
            _ => AppError::Unauthorized,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(fields) => json!({
                "error": self.code(),
                "message": "Validation failed",
                "fields": fields,
            }),
            AppError::MalformedBody(_) => json!({
                "error": self.code(),
                "message": "Malformed request body",
            }),
            AppError::MalformedQuery(_) => json!({
                "error": self.code(),
                "message": "Malformed query string",
            }),
            AppError::DuplicateEmail => json!({
                "error": self.code(),
                "message": "Email already exists",
            }),
            AppError::InvalidCredentials => json!({
                "error": self.code(),
                "message": "Invalid credentials",
            }),
            AppError::Unauthorized => json!({
                "error": self.code(),
                "message": "Authentication required",
            }),
            AppError::Forbidden => json!({
                "error": self.code(),
                "message": "Admin access required",
            }),
            AppError::ForbiddenSelfDelete => json!({
                "error": self.code(),
                "message": "You cannot delete yourself",
            }),
            AppError::NotFound => json!({
                "error": self.code(),
                "message": "User not found",
            }),
            AppError::Storage(e) => {
                error!(error = %e, "storage failure");
                json!({ "error": self.code(), "message": "Internal server error" })
            }
            AppError::Internal(e) => {
                error!(error = %e, "internal failure");
                json!({ "error": self.code(), "message": "Internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}
