//! siteverify HTTP client.

use crate::error::RecaptchaError;
use crate::types::{SiteVerifyRequest, SiteVerifyResponse};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Public siteverify endpoint.
pub const DEFAULT_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// reCAPTCHA siteverify client.
///
/// The site secret is stored using `SecretString` to prevent accidental
/// exposure in logs or debug output.
#[derive(Clone)]
pub struct RecaptchaClient {
    client: Client,
    verify_url: String,
    secret: SecretString,
}

impl RecaptchaClient {
    /// Create a new siteverify client.
    pub fn new(
        secret: impl Into<String>,
        verify_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RecaptchaError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            verify_url: verify_url.into(),
            secret: SecretString::new(secret.into()),
        })
    }

    /// Endpoint this client posts tokens to.
    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }

    /// Verify a client-side token.
    ///
    /// Returns the raw verdict; deciding what score is acceptable is up to
    /// the caller.
    #[instrument(skip(self, token), fields(token_len = token.len()))]
    pub async fn verify(&self, token: &str) -> Result<SiteVerifyResponse, RecaptchaError> {
        if token.is_empty() {
            return Err(RecaptchaError::EmptyToken);
        }

        let form = SiteVerifyRequest {
            secret: self.secret.expose_secret(),
            response: token,
        };

        let response = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            warn!(status = %status, "siteverify request failed");
            return Err(RecaptchaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let verdict: SiteVerifyResponse = serde_json::from_str(&body)?;

        debug!(
            success = verdict.success,
            score = ?verdict.score,
            errors = ?verdict.error_codes,
            "siteverify verdict received"
        );

        Ok(verdict)
    }
}
