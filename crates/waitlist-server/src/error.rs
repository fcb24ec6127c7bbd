//! Error types for the waitlist endpoint.

use crate::store::StoreError;
use crate::throttle::{ThrottleDecision, ThrottleError};
use crate::validation::FieldError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use recaptcha_client::RecaptchaError;
use serde::Serialize;
use thiserror::Error;

/// Waitlist submission outcomes other than success.
///
/// The `Display` text of each variant is the message returned to the
/// caller; internal detail is only ever logged.
#[derive(Debug, Error)]
pub enum WaitlistError {
    #[error("Server configuration error.")]
    Configuration,

    #[error("Cannot determine IP address for rate limiting.")]
    ClientIdentification,

    #[error("Too many requests. Please try again later.")]
    Throttled(ThrottleDecision),

    #[error("Invalid request data.")]
    MalformedRequest,

    #[error("reCAPTCHA token is missing.")]
    MissingToken,

    #[error("reCAPTCHA verification failed. You might be a bot.")]
    BotSuspected,

    #[error("{0}")]
    FieldValidation(#[from] FieldError),

    #[error("This email is already on the waitlist.")]
    DuplicateEmail,

    #[error("An unexpected error occurred. Please try again later.")]
    Unexpected(String),
}

impl WaitlistError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            WaitlistError::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            WaitlistError::ClientIdentification => StatusCode::BAD_REQUEST,
            WaitlistError::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
            WaitlistError::MalformedRequest => StatusCode::BAD_REQUEST,
            WaitlistError::MissingToken => StatusCode::BAD_REQUEST,
            WaitlistError::BotSuspected => StatusCode::FORBIDDEN,
            WaitlistError::FieldValidation(_) => StatusCode::BAD_REQUEST,
            WaitlistError::DuplicateEmail => StatusCode::CONFLICT,
            WaitlistError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<i64>,
}

impl From<&WaitlistError> for ErrorResponse {
    fn from(error: &WaitlistError) -> Self {
        let throttle = match error {
            WaitlistError::Throttled(decision) => Some(decision),
            _ => None,
        };

        Self {
            message: error.to_string(),
            limit: throttle.map(|d| d.limit),
            remaining: throttle.map(|d| d.remaining),
            reset: throttle.map(|d| d.reset),
        }
    }
}

impl IntoResponse for WaitlistError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::from(&self);
        (self.status(), Json(body)).into_response()
    }
}

impl From<ThrottleError> for WaitlistError {
    fn from(e: ThrottleError) -> Self {
        WaitlistError::Unexpected(format!("Throttle check failed: {}", e))
    }
}

impl From<RecaptchaError> for WaitlistError {
    fn from(e: RecaptchaError) -> Self {
        WaitlistError::Unexpected(format!("Bot verification failed: {}", e))
    }
}

impl From<StoreError> for WaitlistError {
    fn from(e: StoreError) -> Self {
        WaitlistError::Unexpected(format!("Storage error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let decision = ThrottleDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset: 1_700_000_000_000,
        };

        assert_eq!(WaitlistError::Configuration.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(WaitlistError::ClientIdentification.status(), StatusCode::BAD_REQUEST);
        assert_eq!(WaitlistError::Throttled(decision).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(WaitlistError::MalformedRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(WaitlistError::MissingToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(WaitlistError::BotSuspected.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            WaitlistError::FieldValidation(FieldError::Email).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(WaitlistError::DuplicateEmail.status(), StatusCode::CONFLICT);
        assert_eq!(
            WaitlistError::Unexpected("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_throttled_body_carries_metadata() {
        let error = WaitlistError::Throttled(ThrottleDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset: 1_700_000_000_000,
        });

        let json = serde_json::to_value(ErrorResponse::from(&error)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "Too many requests. Please try again later.",
                "limit": 5,
                "remaining": 0,
                "reset": 1_700_000_000_000i64
            })
        );
    }

    #[test]
    fn test_unexpected_detail_is_not_exposed() {
        let error = WaitlistError::Unexpected("connection refused at 10.0.0.5:5432".into());

        let json = serde_json::to_value(ErrorResponse::from(&error)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "An unexpected error occurred. Please try again later."
            })
        );
    }

    #[test]
    fn test_field_validation_message() {
        let error: WaitlistError = FieldError::Name.into();
        assert_eq!(error.to_string(), "Name must be between 2 and 100 characters.");
    }
}
