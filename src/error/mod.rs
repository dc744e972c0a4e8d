//! Application error types and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::TokenError;

/// Copy returned for every 500-class failure. Details only go to the log.
const GENERIC_FAILURE: &str = "Something went wrong";

/// Application-level errors. Every variant maps to exactly one status code.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error")]
    Validation(Vec<String>),

    #[error("Email already in use")]
    DuplicateEmail,

    /// Same copy for an unknown email and a wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Refresh token is required")]
    MissingRefreshToken,

    #[error("Session expired. Please log in again")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Too many login attempts, please try again after 15 minutes")]
    RateLimited,

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateEmail => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::Unauthorized
            | AppError::MissingRefreshToken
            | AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Db(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid => AppError::InvalidToken,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(details) => json!({
                "error": self.to_string(),
                "details": details,
            }),
            AppError::Db(e) => {
                error!(error = %e, "database failure");
                json!({ "error": GENERIC_FAILURE })
            }
            AppError::Internal(e) => {
                error!(error = %e, "internal failure");
                json!({ "error": GENERIC_FAILURE })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
