//! AES-GCM helpers shared by the local and keystore engines.

use aes_gcm::{
    aead::{
        consts::{U12, U13, U14, U15, U16},
        Aead, AeadCore, KeyInit, Nonce,
    },
    aes::{Aes128, Aes192, Aes256},
    AesGcm,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::key_provider::KeySize;

/// GCM nonce (IV) length in bytes.
pub const NONCE_LEN: usize = 12;

/// Block cipher mode of the local engine. The padding scheme follows from the
/// mode; GCM is a stream construction and needs none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockMode {
    #[default]
    Gcm,
}

impl BlockMode {
    pub fn transformation(self) -> &'static str {
        match self {
            BlockMode::Gcm => "AES/GCM/NoPadding",
        }
    }
}

/// GCM authentication tag length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum AuthTagLength {
    Bits96,
    Bits104,
    Bits112,
    Bits120,
    #[default]
    Bits128,
}

impl AuthTagLength {
    pub fn bits(self) -> u32 {
        match self {
            AuthTagLength::Bits96 => 96,
            AuthTagLength::Bits104 => 104,
            AuthTagLength::Bits112 => 112,
            AuthTagLength::Bits120 => 120,
            AuthTagLength::Bits128 => 128,
        }
    }

    pub fn byte_len(self) -> usize {
        self.bits() as usize / 8
    }
}

impl TryFrom<u32> for AuthTagLength {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            96 => Ok(AuthTagLength::Bits96),
            104 => Ok(AuthTagLength::Bits104),
            112 => Ok(AuthTagLength::Bits112),
            120 => Ok(AuthTagLength::Bits120),
            128 => Ok(AuthTagLength::Bits128),
            other => Err(format!(
                "unsupported tag length {other}; expected one of 96, 104, 112, 120, 128"
            )),
        }
    }
}

impl From<AuthTagLength> for u32 {
    fn from(tag: AuthTagLength) -> Self {
        tag.bits()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AeadError {
    #[error("key is {actual} bytes, expected {expected}")]
    InvalidKey { expected: usize, actual: usize },
    #[error("nonce is {0} bytes, expected {NONCE_LEN}")]
    InvalidNonce(usize),
    #[error("encryption failed")]
    Seal,
    #[error("tag verification failed")]
    Open,
}

macro_rules! dispatch {
    ($size:expr, $tag:expr, $func:ident($($arg:expr),*)) => {
        match ($size, $tag) {
            (KeySize::Aes128, AuthTagLength::Bits96) => $func::<AesGcm<Aes128, U12, U12>>($($arg),*),
            (KeySize::Aes128, AuthTagLength::Bits104) => $func::<AesGcm<Aes128, U12, U13>>($($arg),*),
            (KeySize::Aes128, AuthTagLength::Bits112) => $func::<AesGcm<Aes128, U12, U14>>($($arg),*),
            (KeySize::Aes128, AuthTagLength::Bits120) => $func::<AesGcm<Aes128, U12, U15>>($($arg),*),
            (KeySize::Aes128, AuthTagLength::Bits128) => $func::<AesGcm<Aes128, U12, U16>>($($arg),*),
            (KeySize::Aes192, AuthTagLength::Bits96) => $func::<AesGcm<Aes192, U12, U12>>($($arg),*),
            (KeySize::Aes192, AuthTagLength::Bits104) => $func::<AesGcm<Aes192, U12, U13>>($($arg),*),
            (KeySize::Aes192, AuthTagLength::Bits112) => $func::<AesGcm<Aes192, U12, U14>>($($arg),*),
            (KeySize::Aes192, AuthTagLength::Bits120) => $func::<AesGcm<Aes192, U12, U15>>($($arg),*),
            (KeySize::Aes192, AuthTagLength::Bits128) => $func::<AesGcm<Aes192, U12, U16>>($($arg),*),
            (KeySize::Aes256, AuthTagLength::Bits96) => $func::<AesGcm<Aes256, U12, U12>>($($arg),*),
            (KeySize::Aes256, AuthTagLength::Bits104) => $func::<AesGcm<Aes256, U12, U13>>($($arg),*),
            (KeySize::Aes256, AuthTagLength::Bits112) => $func::<AesGcm<Aes256, U12, U14>>($($arg),*),
            (KeySize::Aes256, AuthTagLength::Bits120) => $func::<AesGcm<Aes256, U12, U15>>($($arg),*),
            (KeySize::Aes256, AuthTagLength::Bits128) => $func::<AesGcm<Aes256, U12, U16>>($($arg),*),
        }
    };
}

/// Encrypt `plaintext`, returning `ciphertext || tag`.
pub fn seal(
    size: KeySize,
    tag: AuthTagLength,
    key: &[u8],
    nonce: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, AeadError> {
    check_lengths(size, key, nonce)?;
    dispatch!(size, tag, seal_with(key, nonce, plaintext))
}

/// Decrypt `ciphertext || tag`; any tampering yields [`AeadError::Open`].
pub fn open(
    size: KeySize,
    tag: AuthTagLength,
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, AeadError> {
    check_lengths(size, key, nonce)?;
    dispatch!(size, tag, open_with(key, nonce, ciphertext))
}

/// Fresh random nonce from the OS generator.
pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn check_lengths(size: KeySize, key: &[u8], nonce: &[u8]) -> Result<(), AeadError> {
    if key.len() != size.byte_len() {
        return Err(AeadError::InvalidKey {
            expected: size.byte_len(),
            actual: key.len(),
        });
    }
    if nonce.len() != NONCE_LEN {
        return Err(AeadError::InvalidNonce(nonce.len()));
    }
    Ok(())
}

fn seal_with<C>(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AeadError>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|_| AeadError::InvalidKey {
        expected: C::key_size(),
        actual: key.len(),
    })?;
    cipher
        .encrypt(Nonce::<C>::from_slice(nonce), plaintext)
        .map_err(|_| AeadError::Seal)
}

fn open_with<C>(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, AeadError>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|_| AeadError::InvalidKey {
        expected: C::key_size(),
        actual: key.len(),
    })?;
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), ciphertext)
        .map_err(|_| AeadError::Open)
}
