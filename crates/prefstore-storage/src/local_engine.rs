use async_trait::async_trait;
use prefstore_core::{
    engine::{CryptoEngine, CryptoError},
    transmission::Transmission,
};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::{
    aead::{self, AeadError, AuthTagLength, BlockMode, NONCE_LEN},
    encoding::Base64Variant,
    key_provider::{KeyMaterial, KeyProvider, KeySize},
};

/// AES-GCM engine with a locally held key and an explicit per-message IV.
///
/// The key is fetched from the provider on first use and cached for the
/// lifetime of the engine; concurrent first calls share a single load.
/// `derive` emits both ciphertext and IV text-encoded; the IV must come back
/// unmodified on `integrate`.
pub struct LocalKeyEngine<P: KeyProvider> {
    provider: P,
    block_mode: BlockMode,
    key_size: KeySize,
    tag_length: AuthTagLength,
    encoding: Base64Variant,
    key: OnceCell<KeyMaterial>,
}

impl<P: KeyProvider> LocalKeyEngine<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            block_mode: BlockMode::default(),
            key_size: KeySize::default(),
            tag_length: AuthTagLength::default(),
            encoding: Base64Variant::default(),
            key: OnceCell::new(),
        }
    }

    pub fn with_block_mode(mut self, block_mode: BlockMode) -> Self {
        self.block_mode = block_mode;
        self
    }

    pub fn transformation(&self) -> &'static str {
        self.block_mode.transformation()
    }

    pub fn with_key_size(mut self, key_size: KeySize) -> Self {
        self.key_size = key_size;
        self
    }

    pub fn with_tag_length(mut self, tag_length: AuthTagLength) -> Self {
        self.tag_length = tag_length;
        self
    }

    pub fn with_encoding(mut self, encoding: Base64Variant) -> Self {
        self.encoding = encoding;
        self
    }

    async fn key(&self) -> Result<&KeyMaterial, CryptoError> {
        self.key
            .get_or_try_init(|| async {
                let material = self
                    .provider
                    .get_or_create(self.key_size)
                    .await
                    .map_err(|e| CryptoError::KeyUnavailable {
                        reason: e.to_string(),
                    })?;
                debug!(key_id = %material.id, transformation = self.transformation(), "local key ready");
                Ok::<_, CryptoError>(material)
            })
            .await
    }
}

#[async_trait]
impl<P: KeyProvider> CryptoEngine for LocalKeyEngine<P> {
    fn name(&self) -> &'static str {
        "local-key"
    }

    fn requires_iv(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(len = incoming.payload.len()))]
    async fn derive(&self, incoming: Transmission) -> Result<Transmission, CryptoError> {
        let key = self.key().await?;
        let iv = aead::random_nonce();
        let sealed = match self.block_mode {
            BlockMode::Gcm => aead::seal(
                self.key_size,
                self.tag_length,
                &key.bytes,
                &iv,
                &incoming.payload,
            ),
        };
        let ciphertext = sealed.map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

        Ok(Transmission::with_iv(
            self.encoding.encode(&ciphertext),
            self.encoding.encode(&iv),
        ))
    }

    #[instrument(skip_all, fields(len = outgoing.payload.len()))]
    async fn integrate(&self, outgoing: Transmission) -> Result<Transmission, CryptoError> {
        let encoded_iv = outgoing.iv.ok_or(CryptoError::MissingIv)?;
        let iv = self
            .encoding
            .decode(&encoded_iv)
            .map_err(|_| CryptoError::Authentication)?;
        if iv.len() != NONCE_LEN {
            return Err(CryptoError::Authentication);
        }
        let ciphertext = self
            .encoding
            .decode(&outgoing.payload)
            .map_err(|_| CryptoError::Authentication)?;

        let key = self.key().await?;
        let opened = match self.block_mode {
            BlockMode::Gcm => aead::open(self.key_size, self.tag_length, &key.bytes, &iv, &ciphertext),
        };
        let plaintext = opened.map_err(|e| match e {
            AeadError::Open | AeadError::InvalidNonce(_) => CryptoError::Authentication,
            other => CryptoError::Encryption {
                reason: other.to_string(),
            },
        })?;
        Ok(Transmission::new(plaintext))
    }
}
