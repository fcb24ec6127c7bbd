//! Waitlist signup storage with a unique-email constraint.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, SignupLedger};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A validated signup ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSignup {
    pub name: String,
    pub email: String,
}

/// A stored waitlist signup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignupRecord {
    /// Generated identifier
    pub id: Uuid,

    /// Name as submitted
    pub name: String,

    /// Email as submitted; unique ignoring case
    pub email: String,

    /// When the signup was stored
    pub created_at: DateTime<Utc>,
}

impl SignupRecord {
    /// Create a record with a fresh identifier.
    pub fn new(signup: NewSignup) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: signup.name,
            email: signup.email,
            created_at: Utc::now(),
        }
    }

    /// Key the uniqueness constraint is enforced on.
    pub fn email_key(&self) -> String {
        email_key(&self.email)
    }
}

/// Result of an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The signup was stored
    Inserted(SignupRecord),
    /// A signup with this email already exists; nothing was written
    DuplicateEmail,
    /// The store could not complete the insert
    Failed(String),
}

/// Storage errors outside of inserts.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence for waitlist signups.
///
/// Implementations enforce email uniqueness atomically, so concurrent
/// inserts of the same email yield exactly one `Inserted`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignupStore: Send + Sync {
    /// Insert a signup unless its email is already present.
    async fn insert(&self, signup: NewSignup) -> InsertOutcome;

    /// Number of stored signups.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Normalize an email for the uniqueness check.
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_key_ignores_case() {
        assert_eq!(email_key("Ada@Example.COM"), "ada@example.com");
        assert_eq!(email_key("ada@example.com"), email_key("ADA@EXAMPLE.COM"));
    }

    #[test]
    fn test_record_ids_are_unique() {
        let signup = NewSignup {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
        };

        let a = SignupRecord::new(signup.clone());
        let b = SignupRecord::new(signup);

        assert_ne!(a.id, b.id);
        assert_eq!(a.email_key(), "ada@example.com");
    }

    #[test]
    fn test_record_serialization() {
        let record = SignupRecord::new(NewSignup {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Ada Lovelace");
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["id"], record.id.to_string());
        assert!(json["created_at"].is_string());
    }
}
