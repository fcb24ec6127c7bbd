//! reCAPTCHA client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecaptchaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Empty token")]
    EmptyToken,
}
