use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use prefstore_core::medium::{MediumError, StorageMedium};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

const FORMAT_VERSION: u32 = 1;

type Entries = BTreeMap<String, Vec<u8>>;

/// JSON-file medium. Reads and writes hit an in-process map; `commit`
/// atomically replaces the file with a snapshot of that map.
pub struct FileMedium {
    path: PathBuf,
    entries: RwLock<Entries>,
    commit_lock: tokio::sync::Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    version: u32,
    entries: BTreeMap<String, String>,
}

impl FileMedium {
    /// Open the medium at `path`, loading committed entries if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MediumError> {
        let path = path.into();
        let entries = match read_document(&path)? {
            Some(document) => decode_entries(document)?,
            None => Entries::new(),
        };
        debug!(path = %path.display(), entries = entries.len(), "opened file medium");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            commit_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Entries>, MediumError> {
        self.entries.read().map_err(|err| MediumError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Entries>, MediumError> {
        self.entries.write().map_err(|err| MediumError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

#[async_trait]
impl StorageMedium for FileMedium {
    async fn get(&self, key: &str) -> Result<Vec<u8>, MediumError> {
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| MediumError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), MediumError> {
        self.write()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), MediumError> {
        self.write()?.remove(key);
        Ok(())
    }

    async fn enumerate(&self) -> Result<Vec<(String, Vec<u8>)>, MediumError> {
        Ok(self
            .read()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn clear(&self) -> Result<(), MediumError> {
        self.write()?.clear();
        Ok(())
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn commit(&self) -> Result<(), MediumError> {
        // Commits are serialized so a slower, older snapshot never lands last.
        let _guard = self.commit_lock.lock().await;
        let document = Document {
            version: FORMAT_VERSION,
            entries: self
                .read()?
                .iter()
                .map(|(k, v)| (k.clone(), URL_SAFE_NO_PAD.encode(v)))
                .collect(),
        };
        write_document(&self.path, &document)?;
        debug!(entries = document.entries.len(), "committed");
        Ok(())
    }
}

fn decode_entries(document: Document) -> Result<Entries, MediumError> {
    if document.version != FORMAT_VERSION {
        return Err(MediumError::Storage {
            reason: format!("unsupported format version {}", document.version),
        });
    }
    document
        .entries
        .into_iter()
        .map(|(key, value)| {
            URL_SAFE_NO_PAD
                .decode(value)
                .map(|bytes| (key, bytes))
                .map_err(storage_err)
        })
        .collect()
}

fn write_document(path: &Path, document: &Document) -> Result<(), MediumError> {
    let parent = path.parent().ok_or_else(|| MediumError::Storage {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    let json = serde_json::to_vec(document).map_err(storage_err)?;
    tmp.write_all(&json).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.as_file().sync_all().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn read_document(path: &Path) -> Result<Option<Document>, MediumError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(storage_err(err)),
    };

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(storage_err)?;
    serde_json::from_slice(&buf).map(Some).map_err(storage_err)
}

fn storage_err<E: ToString>(err: E) -> MediumError {
    MediumError::Storage {
        reason: err.to_string(),
    }
}
