use prefstore_core::{
    convert::{ConvertError, ValueKind},
    engine::CryptoError,
    medium::MediumError,
};
use thiserror::Error;

/// Errors surfaced by the store facade.
///
/// Only [`StoreError::KeyNotFound`] ever allows a default value to be
/// substituted; decryption failures always propagate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no entry for key: {key}")]
    KeyNotFound { key: String },
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },
    /// Value could not be encoded in its canonical representation.
    #[error("cannot encode value for {key}")]
    MalformedValue {
        key: String,
        #[source]
        source: ConvertError,
    },
    /// Stored bytes do not decode as the requested type.
    #[error("value for {key} is not a valid {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        #[source]
        source: ConvertError,
    },
    #[error("encryption failure: {reason}")]
    EncryptionFailure { reason: String },
    /// Ciphertext failed verification: tampered data or the wrong key.
    #[error("authentication failed for {key}")]
    AuthenticationFailure { key: String },
    /// A synchronous commit was rejected by the medium.
    #[error("commit failed: {reason}")]
    CommitFailure { reason: String },
    #[error("storage failure: {reason}")]
    Storage { reason: String },
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },
}

impl StoreError {
    pub(crate) fn crypto(key: &str, err: CryptoError) -> Self {
        match err {
            CryptoError::Authentication => StoreError::AuthenticationFailure {
                key: key.to_string(),
            },
            other => StoreError::EncryptionFailure {
                reason: other.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::KeyNotFound { .. })
    }
}

impl From<MediumError> for StoreError {
    fn from(err: MediumError) -> Self {
        match err {
            MediumError::NotFound { key } => StoreError::KeyNotFound { key },
            MediumError::Storage { reason } => StoreError::Storage { reason },
        }
    }
}
