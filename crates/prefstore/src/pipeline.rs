use prefstore_core::{
    charset::Charset,
    convert::{ConverterRegistry, Storable, ValueKind},
    engine::CryptoEngine,
    medium::{MediumError, StorageMedium},
    transmission::Transmission,
};
use tokio::sync::RwLock;
use tracing::{trace, warn};

use crate::error::StoreError;

/// Suffix of the sibling entry holding a value's initialization vector.
pub const IV_SUFFIX: &str = "_iv";

/// Composes converter, crypto engine and medium for one store.
///
/// Write path: encode, `derive`, put (IV sibling first, then payload).
/// Read path: get, `integrate`, decode.
pub struct Pipeline {
    engine: Box<dyn CryptoEngine>,
    converters: ConverterRegistry,
    charset: Charset,
    // Payload/IV pairs span two medium keys; writers take this exclusively so
    // a reader never pairs one write's payload with another write's IV.
    pairs: RwLock<()>,
}

impl Pipeline {
    pub fn new(engine: Box<dyn CryptoEngine>, converters: ConverterRegistry, charset: Charset) -> Self {
        Self {
            engine,
            converters,
            charset,
            pairs: RwLock::new(()),
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn iv_key(key: &str) -> String {
        format!("{key}{IV_SUFFIX}")
    }

    /// Whether `key` names an IV sibling rather than a value.
    pub fn is_iv_entry(&self, key: &str) -> bool {
        self.engine.requires_iv() && key.ends_with(IV_SUFFIX)
    }

    pub async fn write<T: Storable>(
        &self,
        medium: &dyn StorageMedium,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let encoded = self
            .converters
            .resolve::<T>()
            .encode(value, self.charset)
            .map_err(|source| StoreError::MalformedValue {
                key: key.to_string(),
                source,
            })?;
        let derived = self
            .engine
            .derive(Transmission::new(encoded))
            .await
            .map_err(|e| StoreError::crypto(key, e))?;

        let _pair = self.pairs.write().await;
        let previous_iv = match derived.iv {
            Some(iv) => {
                let iv_key = Self::iv_key(key);
                let previous = match medium.get(&iv_key).await {
                    Ok(previous) => Some(previous),
                    Err(MediumError::NotFound { .. }) => None,
                    Err(err) => return Err(err.into()),
                };
                medium.put(&iv_key, &iv).await?;
                Some(previous)
            }
            None if self.engine.requires_iv() => {
                return Err(StoreError::EncryptionFailure {
                    reason: format!("{} engine produced no IV", self.engine.name()),
                })
            }
            None => None,
        };

        if let Err(err) = medium.put(key, &derived.payload).await {
            if let Some(previous) = previous_iv {
                self.restore_iv(medium, key, previous).await;
            }
            return Err(err.into());
        }
        trace!(key, kind = %T::KIND, "wrote entry");
        Ok(())
    }

    /// Put back the IV that pairs with the payload still stored under `key`.
    async fn restore_iv(&self, medium: &dyn StorageMedium, key: &str, previous: Option<Vec<u8>>) {
        let iv_key = Self::iv_key(key);
        let restored = match previous {
            Some(iv) => medium.put(&iv_key, &iv).await,
            None => medium.remove(&iv_key).await,
        };
        if let Err(err) = restored {
            warn!(key, error = %err, "could not restore IV after failed write");
        }
    }

    pub async fn read<T: Storable>(
        &self,
        medium: &dyn StorageMedium,
        key: &str,
    ) -> Result<T, StoreError> {
        let plain = self.read_plain(medium, key).await?;
        self.converters
            .resolve::<T>()
            .decode(&plain, self.charset)
            .map_err(|source| StoreError::TypeMismatch {
                key: key.to_string(),
                expected: T::KIND,
                source,
            })
    }

    /// Remove a value and its IV sibling.
    pub async fn erase(&self, medium: &dyn StorageMedium, key: &str) -> Result<(), StoreError> {
        let _pair = self.pairs.write().await;
        medium.remove(key).await?;
        if self.engine.requires_iv() {
            medium.remove(&Self::iv_key(key)).await?;
        }
        Ok(())
    }

    /// Remove every entry, IV siblings included.
    pub async fn erase_all(&self, medium: &dyn StorageMedium) -> Result<(), StoreError> {
        let _pair = self.pairs.write().await;
        medium.clear().await?;
        Ok(())
    }

    /// Decrypt an already fetched entry and decode it as charset text.
    pub async fn open_text(
        &self,
        key: &str,
        payload: Vec<u8>,
        iv: Option<Vec<u8>>,
    ) -> Result<String, StoreError> {
        let plain = self
            .engine
            .integrate(Transmission { payload, iv })
            .await
            .map_err(|e| StoreError::crypto(key, e))?
            .into_payload();
        self.charset
            .decode(&plain)
            .map_err(|source| StoreError::TypeMismatch {
                key: key.to_string(),
                expected: ValueKind::Text,
                source,
            })
    }

    async fn read_plain(&self, medium: &dyn StorageMedium, key: &str) -> Result<Vec<u8>, StoreError> {
        let (payload, iv) = {
            let _pair = self.pairs.read().await;
            let payload = medium.get(key).await?;
            let iv = if self.engine.requires_iv() {
                match medium.get(&Self::iv_key(key)).await {
                    Ok(iv) => Some(iv),
                    // integrate reports the missing IV
                    Err(MediumError::NotFound { .. }) => None,
                    Err(err) => return Err(err.into()),
                }
            } else {
                None
            };
            (payload, iv)
        };

        let integrated = self
            .engine
            .integrate(Transmission { payload, iv })
            .await
            .map_err(|e| StoreError::crypto(key, e))?;
        Ok(integrated.into_payload())
    }
}
