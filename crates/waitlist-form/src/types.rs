//! Form state and wire types.

use serde::{Deserialize, Serialize};

/// Where the form is in its submission lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FormState {
    #[default]
    Idle,
    Submitting,
    Success,
    Error(String),
}

impl FormState {
    /// Error text to show, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            FormState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, FormState::Submitting)
    }
}

/// Current input values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub name: String,
    pub email: String,
}

/// Body posted to the waitlist endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupPayload {
    pub name: String,
    pub email: String,
    pub recaptcha_token: String,
}

/// What the endpoint answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    /// HTTP status code
    pub status: u16,
    /// `message` field of the body, when the body is JSON and carries one
    pub message: Option<String>,
}

/// Any endpoint response body; only `message` is read.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}
