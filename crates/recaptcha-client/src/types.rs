//! siteverify request and response types.

use serde::{Deserialize, Serialize};

/// Form body posted to the siteverify endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct SiteVerifyRequest<'a> {
    pub secret: &'a str,
    pub response: &'a str,
}

/// Verdict returned by the siteverify endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SiteVerifyResponse {
    /// Whether the token was valid for this site
    pub success: bool,

    /// Score in [0, 1]; 1.0 is very likely a human (v3 only)
    #[serde(default)]
    pub score: Option<f64>,

    /// Action name the token was issued for
    #[serde(default)]
    pub action: Option<String>,

    /// Timestamp of the challenge load (ISO 8601)
    #[serde(default)]
    pub challenge_ts: Option<String>,

    /// Hostname of the site where the challenge was solved
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(rename = "error-codes", default)]
    pub error_codes: Vec<String>,
}

impl SiteVerifyResponse {
    /// Score reported by the service, or 0.0 when it sent none.
    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}
