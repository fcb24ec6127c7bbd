//! Waitlist endpoint HTTP client.

use crate::error::FormError;
use crate::types::{MessageBody, SignupPayload, SubmitResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Path of the signup endpoint relative to the site origin.
pub const WAITLIST_PATH: &str = "/api/waitlist";

/// Submits signups to the waitlist endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WaitlistApi: Send + Sync {
    /// Post a signup.
    ///
    /// Any HTTP response is `Ok`, whatever its status. `Err` means no
    /// response was received.
    async fn submit(&self, payload: &SignupPayload) -> Result<SubmitResponse, FormError>;
}

/// Waitlist endpoint client.
#[derive(Clone)]
pub struct WaitlistClient {
    client: Client,
    endpoint: String,
}

impl WaitlistClient {
    /// Create a client for the site at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, FormError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let base_url = base_url.into();
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), WAITLIST_PATH),
        })
    }

    /// Full URL signups are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl WaitlistApi for WaitlistClient {
    #[instrument(skip(self, payload), fields(email = %payload.email))]
    async fn submit(&self, payload: &SignupPayload) -> Result<SubmitResponse, FormError> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<MessageBody>(&body)
            .ok()
            .and_then(|b| b.message);

        debug!(status, has_message = message.is_some(), "Waitlist endpoint responded");

        Ok(SubmitResponse { status, message })
    }
}
