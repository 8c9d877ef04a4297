use async_trait::async_trait;
use thiserror::Error;

use crate::transmission::Transmission;

/// Errors produced by crypto engines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key could not be generated, loaded or reached.
    #[error("key unavailable: {reason}")]
    KeyUnavailable { reason: String },
    /// Cipher setup or operation failed.
    #[error("encryption failure: {reason}")]
    Encryption { reason: String },
    /// Ciphertext did not authenticate: tampered data or the wrong key.
    #[error("authentication failed: ciphertext was tampered with or the key does not match")]
    Authentication,
    /// Engine threads an IV but none was supplied.
    #[error("initialization vector missing")]
    MissingIv,
}

/// Pluggable encrypt/decrypt strategy bound to at most one symmetric key.
///
/// `derive` protects a payload, `integrate` recovers it. The engine is chosen
/// once when the store is built and never swapped afterwards.
#[async_trait]
pub trait CryptoEngine: Send + Sync {
    /// Short name used for logging.
    fn name(&self) -> &'static str;

    /// Whether `derive` emits an IV that must be handed back to `integrate`.
    fn requires_iv(&self) -> bool {
        false
    }

    async fn derive(&self, incoming: Transmission) -> Result<Transmission, CryptoError>;

    async fn integrate(&self, outgoing: Transmission) -> Result<Transmission, CryptoError>;
}

/// Identity engine for stores that need no confidentiality.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextEngine;

#[async_trait]
impl CryptoEngine for PlainTextEngine {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    async fn derive(&self, incoming: Transmission) -> Result<Transmission, CryptoError> {
        Ok(Transmission::new(incoming.payload))
    }

    async fn integrate(&self, outgoing: Transmission) -> Result<Transmission, CryptoError> {
        Ok(Transmission::new(outgoing.payload))
    }
}
