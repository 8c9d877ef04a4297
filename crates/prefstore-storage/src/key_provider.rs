use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

use crate::{alias_lock, credential_store::CredentialStore};

/// AES key length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeySize {
    Aes128,
    Aes192,
    #[default]
    Aes256,
}

impl KeySize {
    pub fn byte_len(self) -> usize {
        match self {
            KeySize::Aes128 => 16,
            KeySize::Aes192 => 24,
            KeySize::Aes256 => 32,
        }
    }

    pub fn bit_len(self) -> usize {
        self.byte_len() * 8
    }
}

/// Raw symmetric key bytes, wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Identifier for logging (never log key bytes).
    pub id: String,
    pub bytes: Zeroizing<Vec<u8>>,
}

impl KeyMaterial {
    pub fn generate(id: impl Into<String>, size: KeySize) -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; size.byte_len()]);
        OsRng.fill_bytes(&mut bytes);
        Self {
            id: id.into(),
            bytes,
        }
    }

    pub fn from_bytes(id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            bytes: Zeroizing::new(bytes),
        }
    }

    fn ensure_size(&self, size: KeySize) -> Result<(), KeyError> {
        if self.bytes.len() != size.byte_len() {
            return Err(KeyError::Decode(format!(
                "expected {} bytes, got {}",
                size.byte_len(),
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Supplies the local engine's key (OS keychain in production; memory in tests).
///
/// An existing key is always returned as-is; a new one is only generated when
/// none exists yet.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_or_create(&self, size: KeySize) -> Result<KeyMaterial, KeyError>;
}

/// OS keyring-backed provider. The key is stored base64-encoded.
#[derive(Debug)]
pub struct KeyringProvider {
    service: String,
    account: String,
    store: CredentialStore,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
            store: CredentialStore::Platform,
        }
    }

    pub fn with_credential_store(mut self, store: CredentialStore) -> Self {
        self.store = store;
        self
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    async fn get_or_create(&self, size: KeySize) -> Result<KeyMaterial, KeyError> {
        let lock = alias_lock::for_alias(&format!("{}/{}", self.service, self.account));
        let _guard = lock.lock().await;

        // Keyring operations are synchronous; the alias lock serializes them.
        let entry = self
            .store
            .entry(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        match entry.get_password() {
            Ok(secret) => decode_key(&self.account, &secret, size),
            Err(keyring::Error::NoEntry) => {
                let material = KeyMaterial::generate(self.account.clone(), size);
                entry
                    .set_password(&encode_key(&material))
                    .map_err(|e| KeyError::Keyring(e.to_string()))?;
                info!(key_id = %material.id, bits = size.bit_len(), "generated local key");
                Ok(material)
            }
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
    generated: Arc<AtomicUsize>,
}

impl InMemoryKeyProvider {
    /// How many keys this provider has generated.
    pub fn generated_keys(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get_or_create(&self, size: KeySize) -> Result<KeyMaterial, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            existing.ensure_size(size)?;
            return Ok(existing);
        }

        let material = KeyMaterial::generate("memory", size);
        *guard = Some(material.clone());
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(material)
    }
}

/// Provider for a caller-supplied key.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    material: KeyMaterial,
}

impl StaticKeyProvider {
    pub fn new(material: KeyMaterial) -> Self {
        Self { material }
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn get_or_create(&self, size: KeySize) -> Result<KeyMaterial, KeyError> {
        self.material.ensure_size(size)?;
        Ok(self.material.clone())
    }
}

pub(crate) fn encode_key(material: &KeyMaterial) -> String {
    general_purpose::STANDARD.encode(material.bytes.as_slice())
}

pub(crate) fn decode_key(id: &str, secret: &str, size: KeySize) -> Result<KeyMaterial, KeyError> {
    let bytes = general_purpose::STANDARD
        .decode(secret)
        .map_err(|e| KeyError::Decode(e.to_string()))?;
    let material = KeyMaterial::from_bytes(id, bytes);
    material.ensure_size(size)?;
    Ok(material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential_store::shared::SharedCredentials;

    #[tokio::test]
    async fn memory_provider_returns_same_key() {
        let provider = InMemoryKeyProvider::default();
        let first = provider.get_or_create(KeySize::Aes256).await.unwrap();
        let second = provider.get_or_create(KeySize::Aes256).await.unwrap();

        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.id, second.id);
        assert_eq!(provider.generated_keys(), 1);
    }

    #[tokio::test]
    async fn memory_provider_never_regenerates_for_other_size() {
        let provider = InMemoryKeyProvider::default();
        provider.get_or_create(KeySize::Aes128).await.unwrap();
        let err = provider
            .get_or_create(KeySize::Aes256)
            .await
            .expect_err("size mismatch");
        assert!(matches!(err, KeyError::Decode(_)));
        assert_eq!(provider.generated_keys(), 1);
    }

    #[tokio::test]
    async fn static_provider_checks_length() {
        let provider = StaticKeyProvider::new(KeyMaterial::from_bytes("user", vec![3u8; 16]));
        assert!(provider.get_or_create(KeySize::Aes128).await.is_ok());
        assert!(provider.get_or_create(KeySize::Aes256).await.is_err());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode_key("k", "abcd", KeySize::Aes256).expect_err("should reject wrong length");
        assert!(matches!(err, KeyError::Decode(_)));
    }

    #[test]
    fn encoded_key_decodes_back() {
        let material = KeyMaterial::generate("k", KeySize::Aes192);
        let decoded = decode_key("k", &encode_key(&material), KeySize::Aes192).expect("decode");
        assert_eq!(decoded, material);
    }

    #[test]
    fn debug_output_hides_key_bytes() {
        let material = KeyMaterial::from_bytes("k", vec![0xAB; 16]);
        let rendered = format!("{material:?}");
        assert!(!rendered.contains("171"));
        assert!(rendered.contains("len: 16"));
    }

    #[tokio::test]
    async fn keyring_provider_loads_existing_key() {
        let credentials = SharedCredentials::default();
        let store = CredentialStore::custom(credentials.clone());

        let first = KeyringProvider::new("prefstore-provider", "local")
            .with_credential_store(store.clone())
            .get_or_create(KeySize::Aes256)
            .await
            .expect("generate");
        // a new provider stands in for a process restart
        let second = KeyringProvider::new("prefstore-provider", "local")
            .with_credential_store(store)
            .get_or_create(KeySize::Aes256)
            .await
            .expect("load");

        assert_eq!(first.bytes, second.bytes);
        assert_eq!(credentials.writes(), 1);
    }

    #[tokio::test]
    async fn keyring_provider_never_overwrites_wrong_sized_key() {
        let credentials = SharedCredentials::default();
        let store = CredentialStore::custom(credentials.clone());
        let provider =
            KeyringProvider::new("prefstore-provider-size", "local").with_credential_store(store);

        provider.get_or_create(KeySize::Aes128).await.expect("generate");
        let err = provider
            .get_or_create(KeySize::Aes256)
            .await
            .expect_err("size mismatch");
        assert!(matches!(err, KeyError::Decode(_)));
        assert_eq!(credentials.writes(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_keyring_providers_generate_one_key() {
        let credentials = SharedCredentials::default();
        let store = CredentialStore::custom(credentials.clone());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let provider = KeyringProvider::new("prefstore-provider-race", "local")
                .with_credential_store(store.clone());
            handles.push(tokio::spawn(async move {
                provider.get_or_create(KeySize::Aes256).await.expect("key")
            }));
        }
        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.expect("join"));
        }
        assert!(keys.windows(2).all(|pair| pair[0].bytes == pair[1].bytes));
        assert_eq!(credentials.writes(), 1);
    }
}
