//! Waitlist signup service.
//!
//! Accepts `POST /api/waitlist` submissions and runs each through:
//! - per-client throttling keyed on the forwarded client address
//! - reCAPTCHA v3 bot scoring
//! - name and email validation
//! - storage under a unique-email constraint

pub mod api;
pub mod config;
pub mod error;
pub mod store;
pub mod throttle;
pub mod validation;
pub mod verifier;
pub mod waitlist;

pub use config::Config;
pub use error::WaitlistError;
pub use store::{FileStore, InsertOutcome, MemoryStore, SignupRecord, SignupStore};
pub use throttle::{MemoryThrottle, Throttle, ThrottleDecision, UpstashThrottle};
pub use verifier::{BotVerdict, BotVerifier};
pub use waitlist::WaitlistService;
