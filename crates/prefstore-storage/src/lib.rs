//! Concrete engines, key management and storage media for prefstore.
//! Encryption uses AES-GCM with keys sourced from the OS keyring (or test doubles).

pub mod aead;
pub mod credential_store;
pub mod encoding;
pub mod file_medium;
pub mod key_facility;
pub mod key_provider;
pub mod keystore_engine;
pub mod local_engine;

mod alias_lock;
