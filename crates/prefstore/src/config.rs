use std::time::Duration;

use prefstore_core::{
    charset::Charset,
    engine::{CryptoEngine, PlainTextEngine},
};
use prefstore_storage::{
    aead::{AuthTagLength, BlockMode},
    encoding::Base64Variant,
    key_facility::KeyringFacility,
    key_provider::{KeySize, KeyringProvider},
    keystore_engine::KeystoreEngine,
    local_engine::LocalKeyEngine,
};
use serde::{Deserialize, Serialize};

use crate::commit::{AutoSavePolicy, CommitStrategy};

pub const DEFAULT_KEYRING_SERVICE: &str = "prefstore";
pub const DEFAULT_LOCAL_ACCOUNT: &str = "local-key";
pub const DEFAULT_KEYSTORE_ALIAS: &str = "prefstore-keystore";

/// Construction-time settings of a store. Never mutated afterwards.
///
/// Defaults: UTF-8, deferred commit with automatic save, no periodic flush,
/// plaintext engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub charset: Charset,
    pub commit_strategy: CommitStrategy,
    pub auto_save: AutoSavePolicy,
    /// Background flush period for the deferred strategy.
    pub flush_interval_ms: Option<u64>,
    pub encryption: EncryptionType,
}

impl StoreConfig {
    pub fn flush_interval(&self) -> Option<Duration> {
        self.flush_interval_ms.map(Duration::from_millis)
    }
}

/// Which engine protects stored values. Keys come from the OS keyring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EncryptionType {
    #[default]
    PlainText,
    LocalKey {
        #[serde(default = "default_service")]
        service: String,
        #[serde(default = "default_local_account")]
        account: String,
        #[serde(default)]
        block_mode: BlockMode,
        #[serde(default)]
        key_size: KeySize,
        #[serde(default)]
        tag_length: AuthTagLength,
        #[serde(default)]
        encoding: Base64Variant,
    },
    Keystore {
        #[serde(default = "default_service")]
        service: String,
        #[serde(default = "default_keystore_alias")]
        alias: String,
        #[serde(default)]
        tag_length: AuthTagLength,
        #[serde(default)]
        encoding: Base64Variant,
    },
}

impl EncryptionType {
    pub fn local_key() -> Self {
        EncryptionType::LocalKey {
            service: default_service(),
            account: default_local_account(),
            block_mode: BlockMode::default(),
            key_size: KeySize::default(),
            tag_length: AuthTagLength::default(),
            encoding: Base64Variant::default(),
        }
    }

    pub fn keystore() -> Self {
        EncryptionType::Keystore {
            service: default_service(),
            alias: default_keystore_alias(),
            tag_length: AuthTagLength::default(),
            encoding: Base64Variant::default(),
        }
    }

    /// Build the keyring-backed engine this setting describes.
    pub fn build_engine(&self) -> Box<dyn CryptoEngine> {
        match self {
            EncryptionType::PlainText => Box::new(PlainTextEngine),
            EncryptionType::LocalKey {
                service,
                account,
                block_mode,
                key_size,
                tag_length,
                encoding,
            } => Box::new(
                LocalKeyEngine::new(KeyringProvider::new(service.clone(), account.clone()))
                    .with_block_mode(*block_mode)
                    .with_key_size(*key_size)
                    .with_tag_length(*tag_length)
                    .with_encoding(*encoding),
            ),
            EncryptionType::Keystore {
                service,
                alias,
                tag_length,
                encoding,
            } => Box::new(
                KeystoreEngine::new(KeyringFacility::new(service.clone()), alias.clone())
                    .with_tag_length(*tag_length)
                    .with_encoding(*encoding),
            ),
        }
    }
}

fn default_service() -> String {
    DEFAULT_KEYRING_SERVICE.to_string()
}

fn default_local_account() -> String {
    DEFAULT_LOCAL_ACCOUNT.to_string()
}

fn default_keystore_alias() -> String {
    DEFAULT_KEYSTORE_ALIAS.to_string()
}
