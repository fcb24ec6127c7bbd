//! Configuration for the waitlist server.

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::ConfigBuilder;
use recaptcha_client::DEFAULT_VERIFY_URL;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Conventional variable names accepted as lower-priority defaults.
const WELL_KNOWN_VARS: [(&str, &str); 3] = [
    ("recaptcha.secret_key", "RECAPTCHA_SECRET_KEY"),
    ("throttle.upstash_url", "UPSTASH_REDIS_REST_URL"),
    ("throttle.upstash_token", "UPSTASH_REDIS_REST_TOKEN"),
];

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Bot verification configuration
    #[serde(default)]
    pub recaptcha: RecaptchaConfig,

    /// Per-client throttle configuration
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Signup storage configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecaptchaConfig {
    /// Siteverify secret; signups fail with a configuration error without it
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Siteverify endpoint
    #[serde(default = "default_verify_url")]
    pub verify_url: String,

    /// Siteverify request timeout
    #[serde(default = "default_recaptcha_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    /// Upstash Redis REST URL; the in-memory throttle is used without it
    #[serde(default)]
    pub upstash_url: Option<String>,

    /// Upstash Redis REST token
    #[serde(default)]
    pub upstash_token: Option<String>,

    /// Requests allowed per client per window
    #[serde(default = "default_throttle_limit")]
    pub limit: u32,

    /// Sliding window length
    #[serde(default = "default_throttle_window", with = "humantime_serde")]
    pub window: Duration,

    /// Redis key prefix
    #[serde(default = "default_throttle_prefix")]
    pub prefix: String,

    /// Upper bound on a throttle check before the request is let through
    #[serde(default = "default_throttle_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the signup file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Enable persistence (if false, signups are in-memory only)
    #[serde(default = "default_true")]
    pub persist: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for RecaptchaConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            verify_url: default_verify_url(),
            timeout: default_recaptcha_timeout(),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            upstash_url: None,
            upstash_token: None,
            limit: default_throttle_limit(),
            window: default_throttle_window(),
            prefix: default_throttle_prefix(),
            timeout: default_throttle_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            persist: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_verify_url() -> String {
    DEFAULT_VERIFY_URL.into()
}

fn default_recaptcha_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_throttle_limit() -> u32 {
    5
}

fn default_throttle_window() -> Duration {
    Duration::from_secs(5)
}

fn default_throttle_prefix() -> String {
    crate::throttle::DEFAULT_PREFIX.into()
}

fn default_throttle_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/data/waitlist.json")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        for (key, var) in WELL_KNOWN_VARS {
            if let Ok(value) = std::env::var(var) {
                builder = builder
                    .set_default(key, value)
                    .with_context(|| format!("Failed to read {}", var))?;
            }
        }

        Self::from_builder(builder.add_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(false),
        ))
    }

    /// Build configuration from prepared sources.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Siteverify secret, if configured and non-empty.
    pub fn recaptcha_secret(&self) -> Option<&str> {
        self.recaptcha
            .secret_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Upstash REST URL and token, if both are configured and non-empty.
    pub fn upstash_credentials(&self) -> Option<(&str, &str)> {
        let url = self.throttle.upstash_url.as_deref().map(str::trim);
        let token = self.throttle.upstash_token.as_deref().map(str::trim);

        match (url, token) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => Some((url, token)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_builder(config::Config::builder()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.recaptcha.verify_url, DEFAULT_VERIFY_URL);
        assert_eq!(config.recaptcha.timeout, Duration::from_secs(10));
        assert_eq!(config.throttle.limit, 5);
        assert_eq!(config.throttle.window, Duration::from_secs(5));
        assert_eq!(config.throttle.timeout, Duration::from_secs(2));
        assert_eq!(config.throttle.prefix, "@upstash/ratelimit");
        assert!(config.store.persist);
        assert!(!config.log.json);
        assert!(config.recaptcha_secret().is_none());
        assert!(config.upstash_credentials().is_none());
    }

    #[test]
    fn test_string_overrides_are_parsed() {
        let builder = config::Config::builder()
            .set_override("throttle.limit", "10")
            .unwrap()
            .set_override("throttle.window", "1m")
            .unwrap()
            .set_override("recaptcha.secret_key", "s3cret")
            .unwrap()
            .set_override("store.persist", "false")
            .unwrap()
            .set_override("log.json", "true")
            .unwrap();

        let config = Config::from_builder(builder).unwrap();

        assert_eq!(config.throttle.limit, 10);
        assert_eq!(config.throttle.window, Duration::from_secs(60));
        assert_eq!(config.recaptcha_secret(), Some("s3cret"));
        assert!(!config.store.persist);
        assert!(config.log.json);
    }

    #[test]
    fn test_blank_secret_is_unset() {
        let builder = config::Config::builder()
            .set_override("recaptcha.secret_key", "   ")
            .unwrap();

        let config = Config::from_builder(builder).unwrap();
        assert!(config.recaptcha_secret().is_none());
    }

    #[test]
    fn test_upstash_requires_url_and_token() {
        let builder = config::Config::builder()
            .set_override("throttle.upstash_url", "https://example.upstash.io")
            .unwrap();
        let config = Config::from_builder(builder).unwrap();
        assert!(config.upstash_credentials().is_none());

        let builder = config::Config::builder()
            .set_override("throttle.upstash_url", "https://example.upstash.io")
            .unwrap()
            .set_override("throttle.upstash_token", "tok")
            .unwrap();
        let config = Config::from_builder(builder).unwrap();
        assert_eq!(
            config.upstash_credentials(),
            Some(("https://example.upstash.io", "tok"))
        );
    }

    #[test]
    fn test_invalid_duration_is_an_error() {
        let builder = config::Config::builder()
            .set_override("throttle.window", "soon")
            .unwrap();

        assert!(Config::from_builder(builder).is_err());
    }
}
