use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors produced by storage media.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediumError {
    /// Requested key does not exist.
    #[error("entry not found for key: {key}")]
    NotFound { key: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Physical key-value medium the pipeline writes through.
///
/// `get`/`put`/`remove`/`enumerate` act on the medium's in-process layer and
/// are visible immediately; `commit` makes that layer durable. Implementations
/// provide their own mutual exclusion for individual keys.
#[async_trait]
pub trait StorageMedium: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, MediumError>;

    /// Store a value, overwriting any existing entry.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), MediumError>;

    /// Remove a key (idempotent).
    async fn remove(&self, key: &str) -> Result<(), MediumError>;

    /// Snapshot of every entry, in no particular order.
    async fn enumerate(&self) -> Result<Vec<(String, Vec<u8>)>, MediumError>;

    async fn contains(&self, key: &str) -> Result<bool, MediumError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(MediumError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn clear(&self) -> Result<(), MediumError> {
        for (key, _) in self.enumerate().await? {
            self.remove(&key).await?;
        }
        Ok(())
    }

    /// Durably persist every pending change before returning.
    async fn commit(&self) -> Result<(), MediumError>;
}

type Entries = BTreeMap<String, Vec<u8>>;

/// In-memory medium with a separate durable layer.
///
/// Writes land in the pending layer; `commit` copies it to the durable layer.
/// [`InMemoryMedium::reopen`] builds a new medium from the durable layer only,
/// which is what a process restart (or a crash before commit) looks like.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMedium {
    pending: Arc<Mutex<Entries>>,
    durable: Arc<Mutex<Entries>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a restart: a fresh in-process layer seeded from durable state.
    pub fn reopen(&self) -> Result<Self, MediumError> {
        let durable = lock(&self.durable)?.clone();
        Ok(Self {
            pending: Arc::new(Mutex::new(durable)),
            durable: Arc::clone(&self.durable),
            fail_commits: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Make every subsequent `commit` fail until reset.
    pub fn set_commit_failure(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn durable_snapshot(&self) -> Result<Vec<(String, Vec<u8>)>, MediumError> {
        Ok(lock(&self.durable)?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[async_trait]
impl StorageMedium for InMemoryMedium {
    async fn get(&self, key: &str) -> Result<Vec<u8>, MediumError> {
        lock(&self.pending)?
            .get(key)
            .cloned()
            .ok_or_else(|| MediumError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), MediumError> {
        lock(&self.pending)?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), MediumError> {
        lock(&self.pending)?.remove(key);
        Ok(())
    }

    async fn enumerate(&self) -> Result<Vec<(String, Vec<u8>)>, MediumError> {
        Ok(lock(&self.pending)?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn clear(&self) -> Result<(), MediumError> {
        lock(&self.pending)?.clear();
        Ok(())
    }

    async fn commit(&self) -> Result<(), MediumError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(MediumError::Storage {
                reason: "commit rejected".to_string(),
            });
        }
        // durable before pending, so overlapping commits land in snapshot order
        let mut durable = lock(&self.durable)?;
        *durable = lock(&self.pending)?.clone();
        debug!(entries = durable.len(), "committed in-memory medium");
        Ok(())
    }
}

fn lock(entries: &Mutex<Entries>) -> Result<MutexGuard<'_, Entries>, MediumError> {
    entries.lock().map_err(|err| MediumError::Storage {
        reason: format!("lock poisoned: {err}"),
    })
}
