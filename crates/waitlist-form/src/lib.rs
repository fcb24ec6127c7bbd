//! Client side of the waitlist signup.
//!
//! [`WaitlistForm`] holds the form inputs and drives a submission through
//! the anti-bot challenge and the endpoint, publishing its [`FormState`].

mod challenge;
mod client;
mod error;
mod form;
mod types;

pub use challenge::ChallengeProvider;
pub use client::{WaitlistApi, WaitlistClient, WAITLIST_PATH};
pub use error::FormError;
pub use form::{
    fallback_message, WaitlistForm, CONNECTION_FAILURE_MESSAGE, TOKEN_FAILURE_MESSAGE,
};
pub use types::*;
