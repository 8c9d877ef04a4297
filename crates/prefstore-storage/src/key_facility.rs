//! Platform key container contract and its software implementations.
//!
//! Keys never leave the facility as raw bytes: callers get a [`KeyHandle`]
//! naming an alias and ask the facility for single-use cipher objects bound
//! to that key.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::{
    aead::{self, AeadError, AuthTagLength, NONCE_LEN},
    alias_lock,
    credential_store::CredentialStore,
    key_provider::{decode_key, encode_key, KeyMaterial, KeySize},
};

/// Direction a cipher object is initialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    Encrypt,
    Decrypt,
}

/// Opaque reference to a facility-managed key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyHandle {
    alias: String,
}

impl KeyHandle {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FacilityError {
    #[error("key facility unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("no key stored under alias {alias}")]
    UnknownKey { alias: String },
    #[error("tag verification failed")]
    Authentication,
    #[error("cipher failure: {reason}")]
    Cipher { reason: String },
}

/// A cipher initialized for one mode. `finalize` consumes it, so an instance
/// can never be reused, let alone for the opposite direction.
pub trait CipherHandle: Send {
    fn mode(&self) -> CipherMode;

    fn finalize(self: Box<Self>, input: &[u8]) -> Result<Vec<u8>, FacilityError>;
}

#[async_trait]
pub trait KeyFacility: Send + Sync {
    /// Fetch the key stored under `alias`, creating it on first use.
    async fn get_or_create_key(&self, alias: &str) -> Result<KeyHandle, FacilityError>;

    async fn new_cipher(
        &self,
        mode: CipherMode,
        key: &KeyHandle,
        tag: AuthTagLength,
    ) -> Result<Box<dyn CipherHandle>, FacilityError>;
}

/// AES-256-GCM cipher whose output is `nonce || ciphertext || tag`.
struct SoftwareCipher {
    mode: CipherMode,
    key: KeyMaterial,
    tag: AuthTagLength,
}

impl CipherHandle for SoftwareCipher {
    fn mode(&self) -> CipherMode {
        self.mode
    }

    fn finalize(self: Box<Self>, input: &[u8]) -> Result<Vec<u8>, FacilityError> {
        match self.mode {
            CipherMode::Encrypt => {
                let nonce = aead::random_nonce();
                let sealed = aead::seal(KeySize::Aes256, self.tag, &self.key.bytes, &nonce, input)
                    .map_err(cipher_err)?;
                let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
                out.extend_from_slice(&nonce);
                out.extend_from_slice(&sealed);
                Ok(out)
            }
            CipherMode::Decrypt => {
                if input.len() < NONCE_LEN + self.tag.byte_len() {
                    return Err(FacilityError::Authentication);
                }
                let (nonce, sealed) = input.split_at(NONCE_LEN);
                aead::open(KeySize::Aes256, self.tag, &self.key.bytes, nonce, sealed).map_err(
                    |e| match e {
                        AeadError::Open => FacilityError::Authentication,
                        other => cipher_err(other),
                    },
                )
            }
        }
    }
}

fn cipher_err(err: AeadError) -> FacilityError {
    FacilityError::Cipher {
        reason: err.to_string(),
    }
}

/// In-memory facility for tests and ephemeral sessions.
#[derive(Debug, Clone)]
pub struct InMemoryKeyFacility {
    keys: Arc<Mutex<HashMap<String, KeyMaterial>>>,
    generated: Arc<AtomicUsize>,
    available: Arc<AtomicBool>,
}

impl Default for InMemoryKeyFacility {
    fn default() -> Self {
        Self {
            keys: Arc::default(),
            generated: Arc::default(),
            available: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl InMemoryKeyFacility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generated_keys(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    /// Simulate the platform container going away (locked device, missing service).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), FacilityError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FacilityError::Unavailable {
                reason: "in-memory facility disabled".to_string(),
            })
        }
    }

    fn keys(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, KeyMaterial>>, FacilityError> {
        self.keys.lock().map_err(|err| FacilityError::Unavailable {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

#[async_trait]
impl KeyFacility for InMemoryKeyFacility {
    async fn get_or_create_key(&self, alias: &str) -> Result<KeyHandle, FacilityError> {
        self.ensure_available()?;
        let mut keys = self.keys()?;
        if !keys.contains_key(alias) {
            keys.insert(alias.to_string(), KeyMaterial::generate(alias, KeySize::Aes256));
            self.generated.fetch_add(1, Ordering::SeqCst);
        }
        Ok(KeyHandle::new(alias))
    }

    async fn new_cipher(
        &self,
        mode: CipherMode,
        key: &KeyHandle,
        tag: AuthTagLength,
    ) -> Result<Box<dyn CipherHandle>, FacilityError> {
        self.ensure_available()?;
        let material = self
            .keys()?
            .get(key.alias())
            .cloned()
            .ok_or_else(|| FacilityError::UnknownKey {
                alias: key.alias().to_string(),
            })?;
        Ok(Box::new(SoftwareCipher {
            mode,
            key: material,
            tag,
        }))
    }
}

/// Facility backed by the OS keyring: one entry per alias under `service`.
/// Cipher operations run in-process; key bytes stay inside the facility.
#[derive(Debug)]
pub struct KeyringFacility {
    service: String,
    store: CredentialStore,
}

impl KeyringFacility {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            store: CredentialStore::Platform,
        }
    }

    pub fn with_credential_store(mut self, store: CredentialStore) -> Self {
        self.store = store;
        self
    }

    fn entry(&self, alias: &str) -> Result<keyring::Entry, FacilityError> {
        self.store
            .entry(&self.service, alias)
            .map_err(|e| FacilityError::Unavailable {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl KeyFacility for KeyringFacility {
    async fn get_or_create_key(&self, alias: &str) -> Result<KeyHandle, FacilityError> {
        let lock = alias_lock::for_alias(&format!("{}/{}", self.service, alias));
        let _guard = lock.lock().await;

        let entry = self.entry(alias)?;
        match entry.get_password() {
            Ok(_) => Ok(KeyHandle::new(alias)),
            Err(keyring::Error::NoEntry) => {
                let material = KeyMaterial::generate(alias, KeySize::Aes256);
                entry
                    .set_password(&encode_key(&material))
                    .map_err(|e| FacilityError::Unavailable {
                        reason: e.to_string(),
                    })?;
                info!(alias, service = %self.service, "generated keystore key");
                Ok(KeyHandle::new(alias))
            }
            Err(err) => Err(FacilityError::Unavailable {
                reason: err.to_string(),
            }),
        }
    }

    async fn new_cipher(
        &self,
        mode: CipherMode,
        key: &KeyHandle,
        tag: AuthTagLength,
    ) -> Result<Box<dyn CipherHandle>, FacilityError> {
        let secret = match self.entry(key.alias())?.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => {
                return Err(FacilityError::UnknownKey {
                    alias: key.alias().to_string(),
                })
            }
            Err(err) => {
                return Err(FacilityError::Unavailable {
                    reason: err.to_string(),
                })
            }
        };
        let material = decode_key(key.alias(), &secret, KeySize::Aes256).map_err(|e| {
            FacilityError::Unavailable {
                reason: e.to_string(),
            }
        })?;
        Ok(Box::new(SoftwareCipher {
            mode,
            key: material,
            tag,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential_store::shared::SharedCredentials;

    #[tokio::test]
    async fn cipher_round_trips_and_is_single_use() {
        let facility = InMemoryKeyFacility::new();
        let key = facility.get_or_create_key("prefs").await.expect("key");

        let encryptor = facility
            .new_cipher(CipherMode::Encrypt, &key, AuthTagLength::Bits128)
            .await
            .expect("cipher");
        assert_eq!(encryptor.mode(), CipherMode::Encrypt);
        let sealed = encryptor.finalize(b"secret").expect("encrypt");
        assert_eq!(sealed.len(), NONCE_LEN + 6 + 16);

        let decryptor = facility
            .new_cipher(CipherMode::Decrypt, &key, AuthTagLength::Bits128)
            .await
            .expect("cipher");
        assert_eq!(decryptor.finalize(&sealed).expect("decrypt"), b"secret");
    }

    #[tokio::test]
    async fn key_is_created_once_per_alias() {
        let facility = InMemoryKeyFacility::new();
        facility.get_or_create_key("a").await.expect("key");
        facility.get_or_create_key("a").await.expect("key");
        facility.get_or_create_key("b").await.expect("key");
        assert_eq!(facility.generated_keys(), 2);
    }

    #[tokio::test]
    async fn truncated_input_fails_authentication() {
        let facility = InMemoryKeyFacility::new();
        let key = facility.get_or_create_key("prefs").await.expect("key");
        let decryptor = facility
            .new_cipher(CipherMode::Decrypt, &key, AuthTagLength::Bits96)
            .await
            .expect("cipher");
        assert_eq!(
            decryptor.finalize(&[0u8; 8]).expect_err("too short"),
            FacilityError::Authentication
        );
    }

    #[tokio::test]
    async fn unknown_alias_is_reported() {
        let facility = InMemoryKeyFacility::new();
        let err = facility
            .new_cipher(CipherMode::Encrypt, &KeyHandle::new("ghost"), AuthTagLength::Bits128)
            .await
            .err()
            .expect("unknown alias");
        assert!(matches!(err, FacilityError::UnknownKey { .. }));
    }

    #[tokio::test]
    async fn unavailable_facility_is_distinct() {
        let facility = InMemoryKeyFacility::new();
        facility.set_available(false);
        let err = facility
            .get_or_create_key("prefs")
            .await
            .expect_err("unavailable");
        assert!(matches!(err, FacilityError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn keyring_facility_finds_the_key_it_created() {
        let credentials = SharedCredentials::default();
        let store = CredentialStore::custom(credentials.clone());
        let facility = KeyringFacility::new("prefstore-facility").with_credential_store(store.clone());

        let key = facility.get_or_create_key("prefs").await.expect("key");
        let sealed = facility
            .new_cipher(CipherMode::Encrypt, &key, AuthTagLength::Bits128)
            .await
            .expect("cipher")
            .finalize(b"secret")
            .expect("encrypt");

        // a later process sees the same keychain entry
        let restarted = KeyringFacility::new("prefstore-facility").with_credential_store(store);
        let key = restarted.get_or_create_key("prefs").await.expect("key");
        let opened = restarted
            .new_cipher(CipherMode::Decrypt, &key, AuthTagLength::Bits128)
            .await
            .expect("cipher")
            .finalize(&sealed)
            .expect("decrypt");
        assert_eq!(opened, b"secret");
        assert_eq!(credentials.writes(), 1);
    }

    #[tokio::test]
    async fn keyring_facility_reports_missing_alias() {
        let facility = KeyringFacility::new("prefstore-facility-missing")
            .with_credential_store(CredentialStore::custom(SharedCredentials::default()));
        let err = facility
            .new_cipher(CipherMode::Decrypt, &KeyHandle::new("ghost"), AuthTagLength::Bits128)
            .await
            .err()
            .expect("no entry");
        assert!(matches!(err, FacilityError::UnknownKey { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_writes_one_keyring_entry() {
        let credentials = SharedCredentials::default();
        let store = CredentialStore::custom(credentials.clone());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let facility =
                KeyringFacility::new("prefstore-facility-race").with_credential_store(store.clone());
            handles.push(tokio::spawn(async move {
                facility.get_or_create_key("prefs").await.expect("key")
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join").alias(), "prefs");
        }
        assert_eq!(credentials.writes(), 1);
    }
}
