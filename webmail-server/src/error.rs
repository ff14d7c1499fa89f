//! Server error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Phone or email already registered")]
    DuplicateIdentity,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Mail not found")]
    MailNotFound,

    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("New password must differ from the current one")]
    PasswordReuse,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Invalid or already used backup code")]
    InvalidOrUsedBackupCode,

    #[error("Two-factor authentication is not set up")]
    NoTwoFactorSetup,

    #[error("Two-factor verification required")]
    StepUpRequired,

    #[error("Not allowed")]
    Forbidden,

    #[error("No token provided")]
    MissingToken,

    #[error("Invalid token format")]
    MalformedToken,

    #[error("Token is invalid or expired")]
    ExpiredOrInvalidSignature,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::DuplicateIdentity => {
                (StatusCode::CONFLICT, "Phone or email already registered")
            }
            ApiError::AccountNotFound => (StatusCode::NOT_FOUND, "Account not found"),
            ApiError::MailNotFound => (StatusCode::NOT_FOUND, "Mail not found"),
            ApiError::InvalidCredential => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            ApiError::PasswordReuse => (
                StatusCode::BAD_REQUEST,
                "New password must differ from the current one",
            ),
            ApiError::InvalidCode => (StatusCode::UNAUTHORIZED, "Invalid verification code"),
            ApiError::InvalidOrUsedBackupCode => {
                (StatusCode::UNAUTHORIZED, "Invalid or already used backup code")
            }
            ApiError::NoTwoFactorSetup => (
                StatusCode::BAD_REQUEST,
                "Two-factor authentication is not set up",
            ),
            ApiError::StepUpRequired => {
                (StatusCode::FORBIDDEN, "Two-factor verification required")
            }
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Not allowed"),
            ApiError::MissingToken => (StatusCode::UNAUTHORIZED, "No token provided"),
            ApiError::MalformedToken => (StatusCode::FORBIDDEN, "Invalid token format"),
            ApiError::ExpiredOrInvalidSignature => {
                (StatusCode::FORBIDDEN, "Token is invalid or expired")
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "success": false, "reason": message });
        (status, axum::Json(body)).into_response()
    }
}
