use std::{path::PathBuf, sync::Arc};

use crate::config::Config;
use color_eyre::Result;
use dirs::data_dir;
use prefstore::{CommitStrategy, FileMedium, Store};
use tracing::debug;

pub const STORE_FILE: &str = "store.json";

/// Resolve the default data directory for prefstore.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("prefstore"))
}

/// Open the configured store file. Writes commit before the command exits.
pub fn store_from_config(config: &Config) -> Result<Store> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    let path = root.join(STORE_FILE);
    debug!(?path, encryption = ?config.store.encryption, "opening store");

    let mut settings = config.store.clone();
    // a one-shot process cannot wait for a background flush
    settings.commit_strategy = CommitStrategy::Immediate;
    settings.flush_interval_ms = None;

    let medium = FileMedium::open(path)?;
    Ok(Store::from_config(Arc::new(medium), &settings)?)
}

/// Helper for tests: a plaintext store file under `root` with immediate commits.
#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>) -> Store {
    Store::builder(FileMedium::open(root.into().join(STORE_FILE)).expect("open store file"))
        .commit_strategy(CommitStrategy::Immediate)
        .build()
        .expect("build test store")
}
