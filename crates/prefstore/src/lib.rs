//! Typed key-value store with optional transparent encryption.
//!
//! Values pass through a converter (value to bytes), a crypto engine (bytes
//! to protected bytes) and finally a [`StorageMedium`]. The commit policy
//! decides when the medium makes those writes durable.
//!
//! ```no_run
//! use prefstore::{InMemoryMedium, Store};
//!
//! # async fn demo() -> Result<(), prefstore::StoreError> {
//! let store = Store::builder(InMemoryMedium::new()).build()?;
//! store.push("greeting", String::from("hello")).await?;
//! let greeting: String = store.pull("greeting").await?;
//! # Ok(()) }
//! ```

pub mod commit;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;

pub use commit::{AutoSavePolicy, CommitPolicy, CommitStrategy, FlushReporter};
pub use config::{EncryptionType, StoreConfig};
pub use error::StoreError;
pub use pipeline::{Pipeline, IV_SUFFIX};
pub use store::{Store, StoreBuilder};

pub use prefstore_core::{
    charset::Charset,
    convert::{
        ConvertError, ConverterRegistry, EnumValue, Enumerated, Json, Storable, TypeConverter,
        ValueKind,
    },
    engine::{CryptoEngine, CryptoError, PlainTextEngine},
    medium::{InMemoryMedium, MediumError, StorageMedium},
    transmission::Transmission,
};
pub use prefstore_storage::{
    aead::{AuthTagLength, BlockMode},
    credential_store::CredentialStore,
    encoding::Base64Variant,
    file_medium::FileMedium,
    key_facility::{InMemoryKeyFacility, KeyFacility, KeyHandle, KeyringFacility},
    key_provider::{
        InMemoryKeyProvider, KeyMaterial, KeyProvider, KeySize, KeyringProvider,
        StaticKeyProvider,
    },
    keystore_engine::KeystoreEngine,
    local_engine::LocalKeyEngine,
};
