// crates/chitfund-cli/src/file_ledger.rs
//
// JSON-file ledger implementing the `Ledger` trait.
//
// File format:
//   { "funds": [ FundRecord, ... ] }   ordered by fund id
//
// Every submission takes an exclusive lock on a sidecar `<ledger>.lock` file,
// reads the ledger, applies the change, and rewrites it via a temporary file
// plus rename so a crash never leaves a half-written ledger. The lock makes
// concurrent `chitfund` processes take turns; readers need no lock because
// the rename is atomic. A missing file reads as an empty ledger.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use chitfund_core::error::ChitFundError;
use chitfund_core::fund::{FundId, FundRecord};
use chitfund_core::identity::Identity;
use chitfund_core::traits::Ledger;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    funds: Vec<FundRecord>,
}

/// Ledger persisted as a single JSON document.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process; the file
    /// lock covers other processes.
    write_lock: Mutex<()>,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    async fn read(&self) -> Result<LedgerFile, ChitFundError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerFile::default()),
            Err(e) => Err(unavailable(&self.path, "read", e)),
        }
    }

    async fn write(&self, file: &LedgerFile) -> Result<(), ChitFundError> {
        let json = serde_json::to_vec_pretty(file)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| unavailable(&tmp, "write", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| unavailable(&self.path, "replace", e))
    }

    /// Block until this process holds the exclusive lock on the ledger.
    /// The lock is released when the returned file is dropped.
    async fn lock_exclusive(&self) -> Result<File, ChitFundError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| unavailable(dir, "create directory", e))?;
        }
        let lock_path = self.lock_path();
        let opened = lock_path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&opened)?;
            file.lock()?;
            Ok(file)
        })
        .await
        .map_err(|e| ChitFundError::LedgerUnavailable(format!("ledger lock task failed: {}", e)))?
        .map_err(|e| unavailable(&lock_path, "lock", e))
    }

    /// Run `apply` against the current ledger contents under both locks and
    /// persist the result. Nothing is written if `apply` fails.
    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut LedgerFile) -> Result<T, ChitFundError>,
    ) -> Result<T, ChitFundError> {
        let _guard = self.write_lock.lock().await;
        let _lock = self.lock_exclusive().await?;
        let mut file = self.read().await?;
        let out = apply(&mut file)?;
        self.write(&file).await?;
        Ok(out)
    }
}

fn unavailable(path: &Path, action: &str, e: std::io::Error) -> ChitFundError {
    ChitFundError::LedgerUnavailable(format!("failed to {} {}: {}", action, path.display(), e))
}

#[async_trait]
impl Ledger for FileLedger {
    async fn submit_create(&self, record: &FundRecord) -> Result<(), ChitFundError> {
        self.mutate(|file| {
            if file.funds.iter().any(|r| r.id == record.id) {
                return Err(ChitFundError::DuplicateFund(record.id));
            }
            file.funds.push(record.clone());
            file.funds.sort_by_key(|r| r.id);
            Ok(())
        })
        .await?;
        tracing::debug!("Recorded fund {} in {}", record.id, self.path.display());
        Ok(())
    }

    async fn submit_join(
        &self,
        id: FundId,
        identity: &Identity,
        joined_at: i64,
    ) -> Result<FundRecord, ChitFundError> {
        self.mutate(|file| {
            let record = file
                .funds
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(ChitFundError::NotFound(id))?;
            record.apply_join(identity, joined_at)?;
            Ok(record.clone())
        })
        .await
    }

    async fn query_fund(&self, id: FundId) -> Result<Option<FundRecord>, ChitFundError> {
        let file = self.read().await?;
        Ok(file.funds.into_iter().find(|r| r.id == id))
    }

    async fn query_all_funds(&self) -> Result<Vec<FundRecord>, ChitFundError> {
        Ok(self.read().await?.funds)
    }
}
