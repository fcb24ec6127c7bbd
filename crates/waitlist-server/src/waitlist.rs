//! Waitlist submission workflow.
//!
//! A submission runs in two phases. [`WaitlistService::admit`] covers the
//! checks that must happen before the request body is read (configuration,
//! client identification, throttling) and hands back an [`Admission`].
//! [`WaitlistService::enroll`] consumes that admission together with the
//! body and runs parsing, bot scoring, field validation and persistence.
//! Each step short-circuits on failure.

use crate::api::{SignupRequest, SignupResponse};
use crate::error::WaitlistError;
use crate::store::{InsertOutcome, NewSignup, SignupStore};
use crate::throttle::Throttle;
use crate::validation::{validate_email, validate_name};
use crate::verifier::BotVerifier;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Message returned with a successful signup.
pub const SUCCESS_MESSAGE: &str = "Successfully added to waitlist!";

/// A request that passed the checks preceding body parsing.
pub struct Admission {
    verifier: Arc<dyn BotVerifier>,
    client_addr: String,
}

impl Admission {
    /// Address the request was throttled under.
    pub fn client_addr(&self) -> &str {
        &self.client_addr
    }
}

/// Orchestrates the throttle, verifier and store for each submission.
#[derive(Clone)]
pub struct WaitlistService {
    /// `None` when the verification secret is not configured
    verifier: Option<Arc<dyn BotVerifier>>,
    throttle: Arc<dyn Throttle>,
    store: Arc<dyn SignupStore>,
}

impl WaitlistService {
    /// Create a new waitlist service.
    pub fn new(
        verifier: Option<Arc<dyn BotVerifier>>,
        throttle: Arc<dyn Throttle>,
        store: Arc<dyn SignupStore>,
    ) -> Self {
        Self {
            verifier,
            throttle,
            store,
        }
    }

    /// Signup storage backing this service.
    pub fn store(&self) -> &dyn SignupStore {
        self.store.as_ref()
    }

    /// Check configuration, identify the client and apply the throttle.
    pub async fn admit(&self, client_addr: Option<&str>) -> Result<Admission, WaitlistError> {
        let Some(verifier) = self.verifier.clone() else {
            error!("reCAPTCHA secret key is not configured, rejecting signup");
            return Err(WaitlistError::Configuration);
        };

        let Some(client_addr) = client_addr.map(str::trim).filter(|a| !a.is_empty()) else {
            warn!("Could not determine client address from X-Forwarded-For");
            return Err(WaitlistError::ClientIdentification);
        };

        let decision = self.throttle.check(client_addr).await.map_err(|e| {
            error!(client = %client_addr, error = %e, "Throttle check failed");
            WaitlistError::from(e)
        })?;

        if !decision.allowed {
            warn!(
                client = %client_addr,
                limit = decision.limit,
                reset = decision.reset,
                "Rate limit exceeded"
            );
            return Err(WaitlistError::Throttled(decision));
        }

        debug!(client = %client_addr, remaining = decision.remaining, "Throttle check passed");

        Ok(Admission {
            verifier,
            client_addr: client_addr.to_string(),
        })
    }

    /// Parse, score, validate and store an admitted submission.
    pub async fn enroll(
        &self,
        admission: Admission,
        body: &[u8],
    ) -> Result<SignupResponse, WaitlistError> {
        let client = admission.client_addr();

        let request: SignupRequest = serde_json::from_slice(body).map_err(|e| {
            warn!(client = %client, error = %e, "Malformed signup request");
            WaitlistError::MalformedRequest
        })?;

        let Some(token) = request.recaptcha_token.as_deref().filter(|t| !t.is_empty()) else {
            warn!(client = %client, "Signup without reCAPTCHA token");
            return Err(WaitlistError::MissingToken);
        };

        let verdict = admission.verifier.verify(token).await.map_err(|e| {
            error!(client = %client, error = %e, "reCAPTCHA verification request failed");
            WaitlistError::from(e)
        })?;

        if !verdict.is_human() {
            warn!(
                client = %client,
                success = verdict.success,
                score = verdict.score,
                errors = ?verdict.error_codes,
                "reCAPTCHA verification failed"
            );
            return Err(WaitlistError::BotSuspected);
        }

        let name = validate_name(request.name.as_deref()).map_err(|e| {
            warn!(client = %client, "Signup rejected: invalid name");
            WaitlistError::from(e)
        })?;

        let email = validate_email(request.email.as_deref()).map_err(|e| {
            warn!(client = %client, "Signup rejected: invalid email");
            WaitlistError::from(e)
        })?;

        let signup = NewSignup {
            name: name.to_string(),
            email: email.to_string(),
        };

        match self.store.insert(signup).await {
            InsertOutcome::Inserted(record) => {
                info!(
                    client = %client,
                    email = %record.email,
                    id = %record.id,
                    score = verdict.score,
                    "New waitlist signup"
                );
                Ok(SignupResponse {
                    message: SUCCESS_MESSAGE.to_string(),
                    name: record.name,
                    email: record.email,
                    id: record.id,
                })
            }
            InsertOutcome::DuplicateEmail => {
                warn!(client = %client, email = %email, "Email already on the waitlist");
                Err(WaitlistError::DuplicateEmail)
            }
            InsertOutcome::Failed(detail) => {
                error!(client = %client, email = %email, error = %detail, "Failed to store signup");
                Err(WaitlistError::Unexpected(detail))
            }
        }
    }
}
