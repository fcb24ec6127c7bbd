//! Anti-bot challenge capability.

use crate::error::FormError;
use async_trait::async_trait;

/// An anti-bot widget the form can drive.
///
/// `request_token` runs the challenge and yields a token for the endpoint;
/// `reset` readies the widget for the next submission.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChallengeProvider: Send + Sync {
    async fn request_token(&self) -> Result<String, FormError>;

    fn reset(&self);
}
