//! HTTP request handlers.

use super::types::{HealthResponse, SignupResponse};
use super::AppState;
use crate::error::WaitlistError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    Json,
};
use tracing::{info, warn};

/// Upper bound on an accepted signup body.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Header carrying the client address chain set by the fronting proxy.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let signup_count = match state.waitlist.store().count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Could not count signups for health check");
            None
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        signup_count,
    })
}

/// Submit a waitlist signup.
///
/// Takes the raw request so the client can be identified and throttled
/// before the body is read.
pub async fn submit_signup(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<SignupResponse>, WaitlistError> {
    let client_addr = forwarded_client_addr(request.headers());
    let admission = state.waitlist.admit(client_addr.as_deref()).await?;

    let body = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| {
            warn!(client = %admission.client_addr(), error = %e, "Failed to read signup body");
            WaitlistError::MalformedRequest
        })?;

    let response = state.waitlist.enroll(admission, &body).await?;
    info!(id = %response.id, "Signup accepted");

    Ok(Json(response))
}

/// First entry of the `X-Forwarded-For` chain, if non-empty.
pub fn forwarded_client_addr(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(FORWARDED_FOR)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();

    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}
