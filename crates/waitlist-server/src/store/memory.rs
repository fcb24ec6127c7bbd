//! In-memory signup ledger and store.

use super::{email_key, InsertOutcome, NewSignup, SignupRecord, SignupStore, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Signups indexed by normalized email.
///
/// Serialized as a plain list of records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<SignupRecord>", into = "Vec<SignupRecord>")]
pub struct SignupLedger {
    records: HashMap<String, SignupRecord>,
}

impl SignupLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Get a record by email (any case).
    #[cfg(test)]
    pub fn get(&self, email: &str) -> Option<&SignupRecord> {
        self.records.get(&email_key(email))
    }

    /// Check if an email is already enrolled.
    #[cfg(test)]
    pub fn contains(&self, email: &str) -> bool {
        self.records.contains_key(&email_key(email))
    }

    /// Insert a record unless its email is taken.
    ///
    /// Returns `false` and leaves the ledger unchanged on a duplicate.
    pub fn try_insert(&mut self, record: SignupRecord) -> bool {
        let key = record.email_key();
        if self.records.contains_key(&key) {
            return false;
        }
        self.records.insert(key, record);
        true
    }

    /// Remove a record.
    pub fn remove(&mut self, email: &str) -> Option<SignupRecord> {
        self.records.remove(&email_key(email))
    }

    /// Get the number of records.
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

impl From<Vec<SignupRecord>> for SignupLedger {
    fn from(records: Vec<SignupRecord>) -> Self {
        let mut ledger = SignupLedger::new();
        for record in records {
            ledger.try_insert(record);
        }
        ledger
    }
}

impl From<SignupLedger> for Vec<SignupRecord> {
    fn from(ledger: SignupLedger) -> Self {
        let mut records: Vec<SignupRecord> = ledger.records.into_values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }
}

/// Store that keeps signups in process memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<SignupLedger>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignupStore for MemoryStore {
    async fn insert(&self, signup: NewSignup) -> InsertOutcome {
        let mut ledger = self.ledger.write().await;
        let record = SignupRecord::new(signup);

        if !ledger.try_insert(record.clone()) {
            debug!(email = %record.email, "Memory store: duplicate email");
            return InsertOutcome::DuplicateEmail;
        }

        InsertOutcome::Inserted(record)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.ledger.read().await.count())
    }
}
