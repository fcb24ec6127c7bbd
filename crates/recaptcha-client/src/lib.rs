//! reCAPTCHA siteverify client used to score anti-bot tokens.

mod client;
mod error;
mod types;

pub use client::{RecaptchaClient, DEFAULT_VERIFY_URL};
pub use error::RecaptchaError;
pub use types::SiteVerifyResponse;
