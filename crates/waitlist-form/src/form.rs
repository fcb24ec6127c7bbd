//! Signup form state machine.

use crate::challenge::ChallengeProvider;
use crate::client::WaitlistApi;
use crate::error::FormError;
use crate::types::{FormFields, FormState, SignupPayload, SubmitResponse};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const TOKEN_FAILURE_MESSAGE: &str =
    "reCAPTCHA verification failed. Please try again or disable ad blockers.";
pub const CONNECTION_FAILURE_MESSAGE: &str =
    "Could not connect to the server. Please check your internet connection.";

/// Message shown for a failed submission whose response carried none.
pub fn fallback_message(status: u16) -> &'static str {
    match status {
        400 => "Validation error. Please check your inputs.",
        403 => "reCAPTCHA verification failed. Are you a bot?",
        429 => "Too many requests. Please try again later.",
        _ => "An unexpected server error occurred.",
    }
}

/// Collects input, obtains a challenge token, submits and tracks the outcome.
///
/// State changes are published on a `watch` channel; see [`WaitlistForm::subscribe`].
pub struct WaitlistForm {
    api: Arc<dyn WaitlistApi>,
    challenge: Arc<dyn ChallengeProvider>,
    fields: watch::Sender<FormFields>,
    state: watch::Sender<FormState>,
}

impl WaitlistForm {
    pub fn new(api: Arc<dyn WaitlistApi>, challenge: Arc<dyn ChallengeProvider>) -> Self {
        Self {
            api,
            challenge,
            fields: watch::Sender::new(FormFields::default()),
            state: watch::Sender::new(FormState::Idle),
        }
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.fields.send_modify(|f| f.name = name);
    }

    pub fn set_email(&self, email: impl Into<String>) {
        let email = email.into();
        self.fields.send_modify(|f| f.email = email);
    }

    pub fn fields(&self) -> FormFields {
        self.fields.borrow().clone()
    }

    pub fn state(&self) -> FormState {
        self.state.borrow().clone()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<FormState> {
        self.state.subscribe()
    }

    /// Whether the submit trigger is enabled.
    pub fn can_submit(&self) -> bool {
        !self.state.borrow().is_submitting()
    }

    /// Run one submission and return the state it ends in.
    ///
    /// Ignored while another submission is in flight, in which case
    /// `Submitting` is returned and nothing else happens.
    pub async fn submit(&self) -> FormState {
        let started = self.state.send_if_modified(|state| {
            if state.is_submitting() {
                false
            } else {
                *state = FormState::Submitting;
                true
            }
        });

        if !started {
            debug!("Submission already in flight, ignoring");
            return FormState::Submitting;
        }

        let in_flight = InFlight {
            form: self,
            finished: false,
        };
        let outcome = self.attempt().await;
        in_flight.finish(outcome.clone());
        outcome
    }

    async fn attempt(&self) -> FormState {
        let token = match self.request_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not obtain challenge token");
                return FormState::Error(TOKEN_FAILURE_MESSAGE.to_string());
            }
        };

        let fields = self.fields();
        let payload = SignupPayload {
            name: fields.name,
            email: fields.email,
            recaptcha_token: token,
        };

        match self.api.submit(&payload).await {
            Ok(response) if response.status == 200 => {
                info!(email = %payload.email, "Joined the waitlist");
                self.fields.send_replace(FormFields::default());
                FormState::Success
            }
            Ok(response) => {
                warn!(status = response.status, message = ?response.message, "Signup rejected");
                FormState::Error(rejection_message(response))
            }
            Err(e) => {
                warn!(error = %e, "Waitlist endpoint unreachable");
                FormState::Error(CONNECTION_FAILURE_MESSAGE.to_string())
            }
        }
    }

    async fn request_token(&self) -> Result<String, FormError> {
        let token = self.challenge.request_token().await?;
        if token.is_empty() {
            return Err(FormError::NoToken);
        }
        Ok(token)
    }
}

/// A started submission.
///
/// Dropped without `finish` (the submit future was cancelled), it resets
/// the challenge and returns the form to `Idle`.
struct InFlight<'a> {
    form: &'a WaitlistForm,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self, outcome: FormState) {
        self.finished = true;
        self.form.challenge.reset();
        self.form.state.send_replace(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Submission cancelled, returning to idle");
            self.form.challenge.reset();
            self.form.state.send_replace(FormState::Idle);
        }
    }
}

fn rejection_message(response: SubmitResponse) -> String {
    response
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback_message(response.status).to_string())
}
