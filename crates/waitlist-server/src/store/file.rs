//! JSON-file persistent storage for the signup ledger.

use super::{InsertOutcome, NewSignup, SignupLedger, SignupRecord, SignupStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Store that persists every signup to a JSON file.
///
/// The whole ledger is rewritten on each insert while the lock is held,
/// so the file always reflects exactly the inserts that were acknowledged.
pub struct FileStore {
    ledger: Mutex<SignupLedger>,
    path: PathBuf,
}

impl FileStore {
    /// Open the store at `path`, loading existing signups.
    ///
    /// A missing file is treated as an empty ledger.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let ledger = load(&path).await?;

        Ok(Self {
            ledger: Mutex::new(ledger),
            path,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the ledger to disk atomically.
    async fn save(&self, ledger: &SignupLedger) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(ledger)?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write atomically using temp file + rename
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!("Saved signup ledger ({} bytes) to {:?}", data.len(), self.path);
        Ok(())
    }
}

async fn load(path: &Path) -> Result<SignupLedger, StoreError> {
    if !path.exists() {
        info!(
            "Signup file not found at {:?}, starting with empty ledger",
            path
        );
        return Ok(SignupLedger::new());
    }

    let data = fs::read(path).await?;
    if data.is_empty() {
        warn!("Signup file {:?} is empty, starting with empty ledger", path);
        return Ok(SignupLedger::new());
    }

    let ledger: SignupLedger = serde_json::from_slice(&data)?;
    info!("Loaded {} signups from {:?}", ledger.count(), path);
    Ok(ledger)
}

#[async_trait]
impl SignupStore for FileStore {
    async fn insert(&self, signup: NewSignup) -> InsertOutcome {
        let mut ledger = self.ledger.lock().await;
        let record = SignupRecord::new(signup);

        if !ledger.try_insert(record.clone()) {
            return InsertOutcome::DuplicateEmail;
        }

        if let Err(e) = self.save(&ledger).await {
            error!(error = %e, path = ?self.path, "Failed to persist signup, rolling back");
            ledger.remove(&record.email);
            return InsertOutcome::Failed(e.to_string());
        }

        InsertOutcome::Inserted(record)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.ledger.lock().await.count())
    }
}
