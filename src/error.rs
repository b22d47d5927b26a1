use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable machine-readable error codes shared with clients. Display text in
/// `message` is advisory; clients key their copy off `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    InvalidCredentials,
    AccountDeactivated,
    Unauthorized,
    WrongPassword,
    Forbidden,
    NotFound,
    EmailTaken,
    InvalidOtp,
    OtpExpired,
    OtpNotIssued,
    AlreadyVerified,
    InvalidResetToken,
    Internal,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub field: Option<&'static str>,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    message: String,
}

impl ApiError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            field: None,
            message: message.into(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Validation,
            field: Some(field),
            message: message.into(),
        }
    }

    /// Single body for unknown email and wrong password. The two cases must
    /// stay textually identical so login failures do not reveal which field
    /// was wrong.
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials, "Invalid credentials")
    }

    pub fn account_deactivated() -> Self {
        Self::new(ErrorCode::AccountDeactivated, "Account has been deactivated")
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn wrong_password() -> Self {
        Self::new(ErrorCode::WrongPassword, "Current password is incorrect")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn email_taken() -> Self {
        Self::new(ErrorCode::EmailTaken, "Email already registered")
    }

    pub fn invalid_otp() -> Self {
        Self::new(ErrorCode::InvalidOtp, "Invalid OTP code")
    }

    pub fn otp_expired() -> Self {
        Self::new(ErrorCode::OtpExpired, "OTP code has expired")
    }

    pub fn otp_not_issued() -> Self {
        Self::new(ErrorCode::OtpNotIssued, "No OTP code was issued")
    }

    pub fn already_verified() -> Self {
        Self::new(ErrorCode::AlreadyVerified, "Email is already verified")
    }

    /// Single body for unknown and expired reset tokens, so a probing caller
    /// cannot tell whether a given token was ever valid.
    pub fn invalid_reset_token() -> Self {
        Self::new(ErrorCode::InvalidResetToken, "Invalid or expired reset token")
    }

    /// Generic 500; the caller logs the underlying error before converting.
    pub fn internal() -> Self {
        Self::new(ErrorCode::Internal, "Something went wrong")
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::Validation
            | ErrorCode::InvalidOtp
            | ErrorCode::OtpExpired
            | ErrorCode::OtpNotIssued
            | ErrorCode::AlreadyVerified
            | ErrorCode::InvalidResetToken => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidCredentials
            | ErrorCode::AccountDeactivated
            | ErrorCode::Unauthorized
            | ErrorCode::WrongPassword => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::EmailTaken => StatusCode::CONFLICT,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            success: false,
            error: self.code,
            field: self.field,
            message: self.message,
        };
        (status, Json(body)).into_response()
    }
}
