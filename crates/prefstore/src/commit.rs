use std::{fmt, sync::Arc, time::Duration};

use prefstore_core::medium::{MediumError, StorageMedium};
use serde::{Deserialize, Serialize};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::error::StoreError;

/// When pending writes reach durable storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitStrategy {
    /// Commit synchronously; failures surface as [`StoreError::CommitFailure`].
    Immediate,
    /// Flush in the background; failures go to the log and the flush reporter,
    /// and the pending writes stay buffered for the next flush.
    #[default]
    Deferred,
}

/// Whether every mutating call triggers a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoSavePolicy {
    #[default]
    Automatic,
    /// Only [`crate::Store::save`] (or a periodic flush) commits.
    Manual,
}

/// Callback receiving background flush failures.
pub type FlushReporter = Arc<dyn Fn(&MediumError) + Send + Sync>;

/// Strategy and auto-save policy, fixed when the store is built.
#[derive(Clone, Default)]
pub struct CommitPolicy {
    strategy: CommitStrategy,
    auto_save: AutoSavePolicy,
    reporter: Option<FlushReporter>,
}

impl CommitPolicy {
    pub fn new(strategy: CommitStrategy, auto_save: AutoSavePolicy) -> Self {
        Self {
            strategy,
            auto_save,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: FlushReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn strategy(&self) -> CommitStrategy {
        self.strategy
    }

    pub fn auto_save(&self) -> AutoSavePolicy {
        self.auto_save
    }

    pub(crate) async fn after_mutation(
        &self,
        medium: &Arc<dyn StorageMedium>,
    ) -> Result<(), StoreError> {
        match self.auto_save {
            AutoSavePolicy::Automatic => self.flush(medium).await,
            AutoSavePolicy::Manual => Ok(()),
        }
    }

    pub(crate) async fn flush(&self, medium: &Arc<dyn StorageMedium>) -> Result<(), StoreError> {
        match self.strategy {
            CommitStrategy::Immediate => {
                medium
                    .commit()
                    .await
                    .map_err(|e| StoreError::CommitFailure {
                        reason: e.to_string(),
                    })
            }
            CommitStrategy::Deferred => {
                let medium = Arc::clone(medium);
                let reporter = self.reporter.clone();
                tokio::spawn(async move {
                    background_flush(medium.as_ref(), reporter.as_ref()).await;
                });
                Ok(())
            }
        }
    }

    pub(crate) fn start_periodic(
        &self,
        medium: Arc<dyn StorageMedium>,
        every: Duration,
    ) -> Result<FlushScheduler, StoreError> {
        FlushScheduler::start(medium, every, self.reporter.clone())
    }
}

impl fmt::Debug for CommitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitPolicy")
            .field("strategy", &self.strategy)
            .field("auto_save", &self.auto_save)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

async fn background_flush(medium: &dyn StorageMedium, reporter: Option<&FlushReporter>) {
    match medium.commit().await {
        Ok(()) => debug!("deferred flush committed"),
        Err(err) => {
            warn!(error = %err, "deferred flush failed; changes stay pending");
            if let Some(report) = reporter {
                report(&err);
            }
        }
    }
}

/// Periodic background flush, stopped when dropped.
pub(crate) struct FlushScheduler {
    handle: JoinHandle<()>,
}

impl FlushScheduler {
    fn start(
        medium: Arc<dyn StorageMedium>,
        every: Duration,
        reporter: Option<FlushReporter>,
    ) -> Result<Self, StoreError> {
        if every.is_zero() {
            return Err(StoreError::Configuration {
                reason: "flush interval must be greater than zero".to_string(),
            });
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| StoreError::Configuration {
                reason: format!("periodic flush needs a tokio runtime: {e}"),
            })?;

        let handle = runtime.spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                background_flush(medium.as_ref(), reporter.as_ref()).await;
            }
        });
        Ok(Self { handle })
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
