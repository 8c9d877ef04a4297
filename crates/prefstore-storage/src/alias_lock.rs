use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, Mutex},
};

type Locks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

static ALIAS_LOCKS: LazyLock<Locks> = LazyLock::new(Locks::default);

/// Process-wide lock for one key alias. Holding it across generate-or-load
/// keeps two engines from minting different keys for the same alias.
pub(crate) fn for_alias(alias: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = ALIAS_LOCKS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(locks.entry(alias.to_string()).or_default())
}
