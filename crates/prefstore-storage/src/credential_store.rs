use std::{fmt, sync::Arc};

use keyring::{credential::CredentialBuilderApi, CredentialBuilder, Entry};

/// Where keyring entries live: the platform keychain (macOS Keychain, Windows
/// Credential Manager, Secret Service) or a caller-supplied credential builder.
#[derive(Clone, Default)]
pub enum CredentialStore {
    #[default]
    Platform,
    Custom(Arc<CredentialBuilder>),
}

impl CredentialStore {
    pub fn custom(builder: impl CredentialBuilderApi + Send + Sync + 'static) -> Self {
        CredentialStore::Custom(Arc::new(builder))
    }

    pub(crate) fn entry(&self, service: &str, user: &str) -> keyring::Result<Entry> {
        match self {
            CredentialStore::Platform => Entry::new(service, user),
            CredentialStore::Custom(builder) => builder
                .build(None, service, user)
                .map(Entry::new_with_credential),
        }
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialStore::Platform => f.write_str("Platform"),
            CredentialStore::Custom(_) => f.write_str("Custom"),
        }
    }
}
