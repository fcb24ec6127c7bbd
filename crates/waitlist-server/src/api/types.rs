//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Waitlist signup request body.
///
/// Every field is optional at the parsing stage so that a missing field is
/// reported by the step responsible for it rather than as malformed JSON.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub recaptcha_token: Option<String>,
}

/// Response after a successful signup.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub name: String,
    pub email: String,
    pub id: Uuid,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub signup_count: Option<usize>,
}
