use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::types::FlashCategory;
use super::ApiResponse;
use crate::forms::FieldErrors;
use crate::services::{MailerError, TokenError};

#[derive(Debug)]
pub enum ApiError {
    /// Form rejected; the map names the offending fields.
    ValidationFailed(FieldErrors),

    /// No session on a members-only route. `next` is the path to return to
    /// after logging in.
    Unauthenticated { next: String },

    /// Login attempt failed. The message becomes a danger flash.
    InvalidCredentials(String),

    /// Password-reset token failed verification or has expired.
    InvalidToken,

    /// Acting on somebody else's post.
    Forbidden,

    NotFound(String),

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::ValidationFailed(_) => write!(f, "Validation failed"),
            ApiError::Unauthenticated { next } => write!(f, "Login required for {}", next),
            ApiError::InvalidCredentials(msg) => write!(f, "Invalid credentials: {}", msg),
            ApiError::InvalidToken => write!(f, "Invalid or expired reset token"),
            ApiError::Forbidden => write!(f, "Forbidden"),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::ValidationFailed(errors) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::<()>::error("Validation failed").with_errors(errors),
            ),
            ApiError::Unauthenticated { next } => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::<()>::error("Login required")
                    .with_flash(
                        FlashCategory::Info,
                        "This page is for members only, please log in",
                    )
                    .with_redirect(format!("/login/?next={next}")),
            ),
            ApiError::InvalidCredentials(message) => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::<()>::error("Invalid credentials")
                    .with_flash(FlashCategory::Danger, message),
            ),
            ApiError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::<()>::error("The reset link is invalid or has expired"),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                ApiResponse::<()>::error("You are not the author of this post"),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiResponse::<()>::error(msg)),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::<()>::error("A database error occurred"),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::<()>::error("An internal error occurred"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::ValidationFailed(errors)
    }
}

impl From<TokenError> for ApiError {
    fn from(_: TokenError) -> Self {
        // Expired and forged tokens are indistinguishable to the caller.
        ApiError::InvalidToken
    }
}

impl From<MailerError> for ApiError {
    fn from(err: MailerError) -> Self {
        ApiError::InternalError(format!("Mail delivery failed: {err}"))
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(err: tower_sessions::session::Error) -> Self {
        ApiError::InternalError(format!("Session error: {err}"))
    }
}

impl ApiError {
    pub fn post_not_found(id: i32) -> Self {
        ApiError::NotFound(format!("Post {} not found", id))
    }

    pub fn user_not_found(username: &str) -> Self {
        ApiError::NotFound(format!("User '{}' not found", username))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}
