//! Error types for Mingle
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses
/// with a `{success: false, error: {code, message}}` body.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required or token invalid (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Caller is not the actor allowed to perform this action (403)
    #[error("You are not allowed to perform this action")]
    UnauthorizedAction,

    /// Access to a resource denied by visibility rules (403)
    #[error("{0}")]
    Forbidden(String),

    /// Malformed or self-referential request (400)
    #[error("{0}")]
    InvalidRequest(String),

    /// Input validation failure (400)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown user id (404)
    #[error("User not found")]
    UserNotFound,

    /// Unknown or no-longer-pending friend request (404)
    #[error("Friend request not found")]
    RequestNotFound,

    /// Unfriend with no existing edge (404)
    #[error("Friendship not found")]
    FriendshipNotFound,

    /// Unknown post id (404)
    #[error("Post not found")]
    PostNotFound,

    /// Send-request while already friends (409)
    #[error("Users are already friends")]
    AlreadyFriends,

    /// Send-request while a pending request already exists (409)
    #[error("Friend request already sent")]
    RequestAlreadySent,

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token signing/verification failure (500)
    #[error("Token error: {0}")]
    Token(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Stable machine-readable error code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::UnauthorizedAction => "UNAUTHORIZED_ACTION",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::RequestNotFound => "REQUEST_NOT_FOUND",
            AppError::FriendshipNotFound => "FRIENDSHIP_NOT_FOUND",
            AppError::PostNotFound => "POST_NOT_FOUND",
            AppError::AlreadyFriends => "ALREADY_FRIENDS",
            AppError::RequestAlreadySent => "REQUEST_ALREADY_SENT",
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Token(_)
            | AppError::Internal(_) => "SERVER_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::UnauthorizedAction | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UserNotFound
            | AppError::RequestNotFound
            | AppError::FriendshipNotFound
            | AppError::PostNotFound => StatusCode::NOT_FOUND,
            AppError::AlreadyFriends | AppError::RequestAlreadySent => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Token(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body. Infrastructure faults are logged with
    /// full detail but surfaced to the caller as a generic message.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let code = self.code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed with internal error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[code]).inc();

        let body = Json(serde_json::json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
            },
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_errors_map_to_409() {
        assert_eq!(AppError::AlreadyFriends.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::RequestAlreadySent.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn database_errors_hide_detail_behind_server_error_code() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), "SERVER_ERROR");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_family_maps_to_404() {
        for err in [
            AppError::UserNotFound,
            AppError::RequestNotFound,
            AppError::FriendshipNotFound,
            AppError::PostNotFound,
        ] {
            assert_eq!(err.status(), StatusCode::NOT_FOUND);
        }
    }
}
