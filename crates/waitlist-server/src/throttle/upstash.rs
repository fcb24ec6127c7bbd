//! Redis-backed sliding-window throttle over the Upstash REST API.

use super::{SlidingWindow, Throttle, ThrottleDecision, ThrottleError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Key prefix shared with other Upstash ratelimit clients.
pub const DEFAULT_PREFIX: &str = "@upstash/ratelimit";

/// Atomic check-and-increment for one sliding window.
///
/// Returns the requests left after this one, or -1 when the window is full.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local currentKey  = KEYS[1]
local previousKey = KEYS[2]
local tokens      = tonumber(ARGV[1])
local now         = tonumber(ARGV[2])
local window      = tonumber(ARGV[3])
local incrementBy = tonumber(ARGV[4])

local requestsInCurrentWindow = redis.call("GET", currentKey)
if requestsInCurrentWindow == false then
  requestsInCurrentWindow = 0
end

local requestsInPreviousWindow = redis.call("GET", previousKey)
if requestsInPreviousWindow == false then
  requestsInPreviousWindow = 0
end

local percentageInCurrent = ( now % window ) / window
requestsInPreviousWindow = math.floor(( 1 - percentageInCurrent ) * requestsInPreviousWindow)
if requestsInPreviousWindow + requestsInCurrentWindow >= tokens then
  return -1
end

local newValue = redis.call("INCRBY", currentKey, incrementBy)
if newValue == incrementBy then
  redis.call("PEXPIRE", currentKey, window * 2 + 1000)
end
return tokens - ( newValue + requestsInPreviousWindow )
"#;

/// Upstash REST response envelope.
#[derive(Debug, Deserialize)]
struct UpstashResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Throttle whose counters live in Redis, shared by every replica.
pub struct UpstashThrottle {
    client: Client,
    url: String,
    token: SecretString,
    prefix: String,
    window: SlidingWindow,
    timeout: Duration,
}

impl UpstashThrottle {
    /// Create a new Upstash throttle.
    ///
    /// `timeout` bounds each check; a check that takes longer is allowed.
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        limit: u32,
        window: Duration,
        prefix: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ThrottleError> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            token: SecretString::new(token.into()),
            prefix: prefix.into(),
            window: SlidingWindow::new(limit, window),
            timeout,
        })
    }

    /// Run the sliding-window script for `key` at `now_ms`.
    async fn eval(&self, key: &str, now_ms: i64) -> Result<i64, ThrottleError> {
        let index = self.window.window_index(now_ms);
        let current_key = format!("{}:{}:{}", self.prefix, key, index);
        let previous_key = format!("{}:{}:{}", self.prefix, key, index - 1);

        let command = serde_json::json!([
            "EVAL",
            SLIDING_WINDOW_SCRIPT,
            "2",
            current_key,
            previous_key,
            self.window.limit.to_string(),
            now_ms.to_string(),
            self.window.window_ms.to_string(),
            "1",
        ]);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.token.expose_secret())
            .json(&command)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: UpstashResponse = serde_json::from_str(&body).map_err(|_| {
            ThrottleError::InvalidResponse(format!("{} - {}", status, body))
        })?;

        if let Some(error) = parsed.error {
            return Err(ThrottleError::Upstash(error));
        }
        if !status.is_success() {
            return Err(ThrottleError::Upstash(format!("HTTP {}", status)));
        }

        parsed
            .result
            .as_ref()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ThrottleError::InvalidResponse(body))
    }
}

#[async_trait]
impl Throttle for UpstashThrottle {
    #[instrument(skip(self))]
    async fn check(&self, key: &str) -> Result<ThrottleDecision, ThrottleError> {
        let now = Utc::now().timestamp_millis();

        let remaining = match tokio::time::timeout(self.timeout, self.eval(key, now)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Throttle check timed out, allowing request");
                return Ok(ThrottleDecision::timed_out());
            }
        };

        debug!(remaining, "Throttle script evaluated");

        Ok(ThrottleDecision {
            allowed: remaining >= 0,
            limit: self.window.limit,
            remaining: remaining.max(0) as u32,
            reset: self.window.reset_at(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn throttle(server: &MockServer, timeout: Duration) -> UpstashThrottle {
        UpstashThrottle::new(
            server.uri(),
            "test-token",
            5,
            Duration::from_secs(5),
            DEFAULT_PREFIX,
            timeout,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_allowed_decision() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_string_contains("EVAL"))
            .and(body_string_contains("@upstash/ratelimit:203.0.113.7:"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let throttle = throttle(&server, Duration::from_secs(2));
        let decision = throttle.check("203.0.113.7").await.unwrap();

        assert!(decision.allowed);
        assert_eq!(decision.limit, 5);
        assert_eq!(decision.remaining, 3);
        assert!(decision.reset > 0);
        assert_eq!(decision.reset % 5000, 0);
    }

    #[tokio::test]
    async fn test_exhausted_window() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": -1
            })))
            .mount(&server)
            .await;

        let throttle = throttle(&server, Duration::from_secs(2));
        let decision = throttle.check("203.0.113.7").await.unwrap();

        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_upstash_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "WRONGPASS invalid password"
            })))
            .mount(&server)
            .await;

        let throttle = throttle(&server, Duration::from_secs(2));
        let result = throttle.check("203.0.113.7").await;

        match result {
            Err(ThrottleError::Upstash(message)) => assert!(message.contains("WRONGPASS")),
            other => panic!("expected Upstash error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let throttle = throttle(&server, Duration::from_secs(2));
        let result = throttle.check("203.0.113.7").await;
        assert!(matches!(result, Err(ThrottleError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_timeout_allows_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "result": -1 }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let throttle = throttle(&server, Duration::from_millis(50));
        let decision = throttle.check("203.0.113.7").await.unwrap();

        assert_eq!(decision, ThrottleDecision::timed_out());
    }
}
