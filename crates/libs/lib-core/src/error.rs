//! # Centralized Error Handling
//!
//! This module defines the application-wide error type [`AppError`] used
//! consistently across the chat subsystem. It follows the `thiserror`
//! pattern for ergonomic error handling.
//!
//! ## Error Categories
//!
//! 1. **Client errors** (4xx)
//!    - [`InvalidInput`](AppError::InvalidInput) → 400 Bad Request
//!    - [`Forbidden`](AppError::Forbidden) → 403 Forbidden
//!    - [`NotFound`](AppError::NotFound) → 404 Not Found
//!
//! 2. **Channel / store errors**
//!    - [`Connection`](AppError::Connection) — transport or auth failure
//!      establishing the shared channel; recovered by retry, never fatal
//!    - [`Subscription`](AppError::Subscription) — live query failed;
//!      surfaced into session state for the UI
//!    - [`SendFailure`](AppError::SendFailure) — persistence write failed;
//!      propagated to the sender with no automatic retry
//!
//! 3. **Server errors** (5xx)
//!    - [`Config`](AppError::Config), [`Internal`](AppError::Internal)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Convenience type alias for `Result<T, AppError>`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application-wide error type covering all error scenarios.
///
/// Each variant includes a descriptive `String` for context. The `#[error]`
/// attribute from `thiserror` provides the `Display` implementation.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error during startup or environment loading.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport or auth failure establishing the shared channel.
    ///
    /// Recovered automatically via retry/backoff; surfaced to the UI only
    /// as a reconnecting indicator.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No resolvable participant set for the requested conversation id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authenticated identity is not a participant of the conversation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Live query failed to establish or was terminated by the store.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Persistence write failed; the caller decides whether to resubmit.
    #[error("Send failure: {0}")]
    SendFailure(String),

    /// Invalid user input validation error.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error (unexpected failures).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Connection(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Subscription(_)
            | AppError::SendFailure(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message.
    ///
    /// For internal errors, returns a generic message to avoid exposing
    /// implementation details.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidInput(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::SendFailure(msg)
            | AppError::Subscription(msg) => msg.clone(),
            AppError::Connection(_) => "Service temporarily unavailable".to_string(),
            AppError::Config(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

/// Implement Axum's `IntoResponse` for automatic error handling.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.user_message();

        // Log error details (full error message for server logs)
        match status {
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                tracing::debug!("Client error: {}", self);
            }
            _ => {
                tracing::error!("Server error: {}", self);
            }
        }

        let error_code = match self {
            AppError::Config(_) => "Config",
            AppError::Connection(_) => "Connection",
            AppError::NotFound(_) => "NotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Subscription(_) => "Subscription",
            AppError::SendFailure(_) => "SendFailure",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Internal(_) => "Internal",
        };

        let body = Json(json!({
            "error": message,
            "code": error_code,
        }));

        (status, body).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert `sqlx::Error` to `AppError`.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                AppError::NotFound("Database record not found".to_string())
            }
            sqlx::Error::Database(db_err) => {
                AppError::Internal(format!("Database error: {}", db_err.message()))
            }
            _ => AppError::Internal(format!("Database error: {}", err)),
        }
    }
}

/// Convert `serde_json::Error` to `AppError`.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON error: {}", err))
    }
}
