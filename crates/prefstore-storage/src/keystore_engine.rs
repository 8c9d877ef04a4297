use async_trait::async_trait;
use prefstore_core::{
    engine::{CryptoEngine, CryptoError},
    transmission::Transmission,
};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::{
    aead::AuthTagLength,
    encoding::Base64Variant,
    key_facility::{CipherMode, FacilityError, KeyFacility, KeyHandle},
};

/// AEAD engine backed by a platform key facility.
///
/// Only the key alias is held here. Every operation asks the facility for a
/// fresh cipher object, so encryptors and decryptors are never shared between
/// callers. Output is `base64(nonce || ciphertext || tag)`; no IV is threaded
/// through the caller.
pub struct KeystoreEngine<F: KeyFacility> {
    facility: F,
    alias: String,
    tag_length: AuthTagLength,
    encoding: Base64Variant,
    handle: OnceCell<KeyHandle>,
}

impl<F: KeyFacility> KeystoreEngine<F> {
    pub fn new(facility: F, alias: impl Into<String>) -> Self {
        Self {
            facility,
            alias: alias.into(),
            tag_length: AuthTagLength::default(),
            encoding: Base64Variant::default(),
            handle: OnceCell::new(),
        }
    }

    pub fn with_tag_length(mut self, tag_length: AuthTagLength) -> Self {
        self.tag_length = tag_length;
        self
    }

    pub fn with_encoding(mut self, encoding: Base64Variant) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    async fn handle(&self) -> Result<&KeyHandle, CryptoError> {
        self.handle
            .get_or_try_init(|| async {
                let handle = self
                    .facility
                    .get_or_create_key(&self.alias)
                    .await
                    .map_err(crypto_err)?;
                debug!(alias = %self.alias, tag_bits = self.tag_length.bits(), "keystore key ready");
                Ok::<_, CryptoError>(handle)
            })
            .await
    }

    async fn run(&self, mode: CipherMode, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let handle = self.handle().await?;
        let cipher = self
            .facility
            .new_cipher(mode, handle, self.tag_length)
            .await
            .map_err(crypto_err)?;
        cipher.finalize(input).map_err(crypto_err)
    }
}

#[async_trait]
impl<F: KeyFacility> CryptoEngine for KeystoreEngine<F> {
    fn name(&self) -> &'static str {
        "keystore"
    }

    #[instrument(skip_all, fields(alias = %self.alias))]
    async fn derive(&self, incoming: Transmission) -> Result<Transmission, CryptoError> {
        let sealed = self.run(CipherMode::Encrypt, &incoming.payload).await?;
        Ok(Transmission::new(self.encoding.encode(&sealed)))
    }

    #[instrument(skip_all, fields(alias = %self.alias))]
    async fn integrate(&self, outgoing: Transmission) -> Result<Transmission, CryptoError> {
        let sealed = self
            .encoding
            .decode(&outgoing.payload)
            .map_err(|_| CryptoError::Authentication)?;
        let plaintext = self.run(CipherMode::Decrypt, &sealed).await?;
        Ok(Transmission::new(plaintext))
    }
}

fn crypto_err(err: FacilityError) -> CryptoError {
    match err {
        FacilityError::Authentication => CryptoError::Authentication,
        FacilityError::Unavailable { .. } | FacilityError::UnknownKey { .. } => {
            CryptoError::KeyUnavailable {
                reason: err.to_string(),
            }
        }
        FacilityError::Cipher { reason } => CryptoError::Encryption { reason },
    }
}
