//! Waitlist form errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Challenge failed: {0}")]
    Challenge(String),

    #[error("Challenge produced no token")]
    NoToken,
}
