//! Bot-score verification of anti-bot tokens.

use async_trait::async_trait;
use recaptcha_client::{RecaptchaClient, RecaptchaError};

/// Lowest score accepted as a human submission.
pub const MIN_BOT_SCORE: f64 = 0.4;

/// Verification service verdict for one token.
#[derive(Debug, Clone, PartialEq)]
pub struct BotVerdict {
    /// Whether the service accepted the token
    pub success: bool,
    /// Human-likelihood score in [0, 1]
    pub score: f64,
    /// Error codes reported by the service
    pub error_codes: Vec<String>,
}

impl BotVerdict {
    /// Whether the verdict clears the acceptance policy.
    pub fn is_human(&self) -> bool {
        self.success && self.score >= MIN_BOT_SCORE
    }
}

/// Scores anti-bot tokens against the verification service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BotVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<BotVerdict, RecaptchaError>;
}

#[async_trait]
impl BotVerifier for RecaptchaClient {
    async fn verify(&self, token: &str) -> Result<BotVerdict, RecaptchaError> {
        let response = RecaptchaClient::verify(self, token).await?;

        Ok(BotVerdict {
            success: response.success,
            score: response.score_or_zero(),
            error_codes: response.error_codes,
        })
    }
}
