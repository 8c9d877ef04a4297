use std::{collections::BTreeMap, sync::Arc, time::Duration};

use prefstore_core::{
    charset::Charset,
    convert::{ConverterRegistry, Storable, TypeConverter},
    engine::{CryptoEngine, PlainTextEngine},
    medium::{MediumError, StorageMedium},
};
use tracing::{debug, instrument};

use crate::{
    commit::{AutoSavePolicy, CommitPolicy, CommitStrategy, FlushScheduler},
    config::StoreConfig,
    error::StoreError,
    pipeline::Pipeline,
};

/// Public surface of the store: push, pull, exists, remove, clear, raw.
///
/// Reads always reflect the latest write on this instance, whether or not it
/// has been flushed yet.
pub struct Store {
    medium: Arc<dyn StorageMedium>,
    pipeline: Pipeline,
    commit: CommitPolicy,
    _scheduler: Option<FlushScheduler>,
}

impl Store {
    pub fn builder(medium: impl StorageMedium + 'static) -> StoreBuilder {
        StoreBuilder::new(Arc::new(medium))
    }

    /// Build a store with the engine and policies described by `config`.
    pub fn from_config(
        medium: Arc<dyn StorageMedium>,
        config: &StoreConfig,
    ) -> Result<Self, StoreError> {
        StoreBuilder::new(medium)
            .config(config)
            .boxed_engine(config.encryption.build_engine())
            .build()
    }

    pub fn engine_name(&self) -> &'static str {
        self.pipeline.engine_name()
    }

    pub fn commit_policy(&self) -> &CommitPolicy {
        &self.commit
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn push<T: Storable>(&self, key: &str, value: T) -> Result<(), StoreError> {
        self.validate(key)?;
        self.pipeline.write(self.medium.as_ref(), key, &value).await?;
        self.commit.after_mutation(&self.medium).await
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn pull<T: Storable>(&self, key: &str) -> Result<T, StoreError> {
        self.validate(key)?;
        self.pipeline.read(self.medium.as_ref(), key).await
    }

    /// Like [`Store::pull`], substituting `default` only when the key is absent.
    pub async fn pull_or<T: Storable>(&self, key: &str, default: T) -> Result<T, StoreError> {
        match self.pull(key).await {
            Err(StoreError::KeyNotFound { .. }) => Ok(default),
            other => other,
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.validate(key)?;
        Ok(self.medium.contains(key).await?)
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.validate(key)?;
        self.pipeline.erase(self.medium.as_ref(), key).await?;
        self.commit.after_mutation(&self.medium).await
    }

    #[instrument(skip_all)]
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.pipeline.erase_all(self.medium.as_ref()).await?;
        self.commit.after_mutation(&self.medium).await
    }

    /// Every entry decrypted and decoded as charset text, sorted by key.
    /// IV siblings are not listed.
    #[instrument(skip_all)]
    pub async fn raw(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut entries: BTreeMap<String, Vec<u8>> =
            self.medium.enumerate().await?.into_iter().collect();
        let ivs: BTreeMap<String, Vec<u8>> = {
            let iv_keys: Vec<String> = entries
                .keys()
                .filter(|key| self.pipeline.is_iv_entry(key))
                .cloned()
                .collect();
            iv_keys
                .into_iter()
                .filter_map(|key| entries.remove_entry(&key))
                .collect()
        };

        let mut out = Vec::with_capacity(entries.len());
        for (key, payload) in entries {
            let iv = ivs.get(&Pipeline::iv_key(&key)).cloned();
            let text = self.pipeline.open_text(&key, payload, iv).await?;
            out.push((key, text));
        }
        Ok(out)
    }

    /// Flush pending writes under the configured strategy, regardless of the
    /// auto-save policy.
    pub async fn save(&self) -> Result<(), StoreError> {
        self.commit.flush(&self.medium).await
    }

    fn validate(&self, key: &str) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key must not be empty",
            });
        }
        if self.pipeline.is_iv_entry(key) {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "suffix is reserved for initialization vectors",
            });
        }
        Ok(())
    }
}

/// Collects the fixed configuration of a [`Store`].
pub struct StoreBuilder {
    medium: Arc<dyn StorageMedium>,
    engine: Option<Box<dyn CryptoEngine>>,
    converters: ConverterRegistry,
    charset: Charset,
    strategy: CommitStrategy,
    auto_save: AutoSavePolicy,
    flush_interval: Option<Duration>,
    reporter: Option<crate::commit::FlushReporter>,
}

impl StoreBuilder {
    pub fn new(medium: Arc<dyn StorageMedium>) -> Self {
        Self {
            medium,
            engine: None,
            converters: ConverterRegistry::new(),
            charset: Charset::default(),
            strategy: CommitStrategy::default(),
            auto_save: AutoSavePolicy::default(),
            flush_interval: None,
            reporter: None,
        }
    }

    /// Apply charset, commit and flush settings. The engine is left alone.
    pub fn config(mut self, config: &StoreConfig) -> Self {
        self.charset = config.charset;
        self.strategy = config.commit_strategy;
        self.auto_save = config.auto_save;
        self.flush_interval = config.flush_interval();
        self
    }

    pub fn engine(self, engine: impl CryptoEngine + 'static) -> Self {
        self.boxed_engine(Box::new(engine))
    }

    pub fn boxed_engine(mut self, engine: Box<dyn CryptoEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn commit_strategy(mut self, strategy: CommitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn auto_save(mut self, auto_save: AutoSavePolicy) -> Self {
        self.auto_save = auto_save;
        self
    }

    pub fn flush_interval(mut self, every: Duration) -> Self {
        self.flush_interval = Some(every);
        self
    }

    /// Override how `T` is represented in storage.
    pub fn converter<T, C>(mut self, converter: C) -> Self
    where
        T: Storable,
        C: TypeConverter<T> + 'static,
    {
        self.converters.register::<T, C>(converter);
        self
    }

    /// Receive deferred-flush failures in addition to the warning log.
    pub fn on_flush_error(mut self, reporter: impl Fn(&MediumError) + Send + Sync + 'static) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// Periodic flushing requires a running tokio runtime.
    pub fn build(self) -> Result<Store, StoreError> {
        let engine = self.engine.unwrap_or_else(|| Box::new(PlainTextEngine));
        let mut commit = CommitPolicy::new(self.strategy, self.auto_save);
        if let Some(reporter) = self.reporter {
            commit = commit.with_reporter(reporter);
        }

        let scheduler = match (self.strategy, self.flush_interval) {
            (CommitStrategy::Deferred, Some(every)) => {
                Some(commit.start_periodic(Arc::clone(&self.medium), every)?)
            }
            (CommitStrategy::Immediate, Some(_)) => {
                debug!("flush interval ignored for immediate commits");
                None
            }
            (_, None) => None,
        };

        debug!(
            engine = engine.name(),
            charset = self.charset.name(),
            strategy = ?self.strategy,
            auto_save = ?self.auto_save,
            "store ready"
        );
        Ok(Store {
            medium: self.medium,
            pipeline: Pipeline::new(engine, self.converters, self.charset),
            commit,
            _scheduler: scheduler,
        })
    }
}
