//! Index lifecycle around a bulk load.
//!
//! Before the load the target index is recreated and its refresh interval
//! disabled; afterwards the index is flushed and the refresh interval restored
//! so the new documents become searchable.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::errors::PipelineError;
use dump_indexer_repository::opensearch::{BULK_REFRESH_INTERVAL, NORMAL_REFRESH_INTERVAL};
use dump_indexer_repository::{IndexSettings, SearchEngineClient};

/// Where the index is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing has been done to the index yet.
    Uninitialized,
    /// The index was recreated and tuned for writes.
    Prepared,
    /// Normal settings were put back.
    Restored,
}

/// Manages creation and settings of the target index.
pub struct IndexLifecycle {
    client: Arc<dyn SearchEngineClient>,
    index: String,
    settings: IndexSettings,
    state: LifecycleState,
}

impl IndexLifecycle {
    pub fn new(client: Arc<dyn SearchEngineClient>, index: impl Into<String>) -> Self {
        Self::with_settings(client, index, IndexSettings::default())
    }

    pub fn with_settings(
        client: Arc<dyn SearchEngineClient>,
        index: impl Into<String>,
        settings: IndexSettings,
    ) -> Self {
        Self {
            client,
            index: index.into(),
            settings,
            state: LifecycleState::Uninitialized,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Recreate the index and disable refreshes.
    ///
    /// A missing index is not an error. Any other failure aborts the run and
    /// leaves the state unchanged.
    #[instrument(skip(self), fields(index = %self.index))]
    pub async fn prepare(&mut self) -> Result<(), PipelineError> {
        let existed = self.client.delete_index(&self.index).await?;
        if existed {
            info!("Deleted index left from a previous run");
        }

        self.client.create_index(&self.index, &self.settings).await?;
        self.client
            .put_refresh_interval(&self.index, BULK_REFRESH_INTERVAL)
            .await?;

        self.state = LifecycleState::Prepared;
        info!(
            shards = self.settings.number_of_shards,
            replicas = self.settings.number_of_replicas,
            refresh_interval = BULK_REFRESH_INTERVAL,
            "Index prepared for bulk load"
        );
        Ok(())
    }

    /// Flush the index. Failures are only logged.
    pub async fn flush(&self) -> bool {
        match self.client.flush_index(&self.index).await {
            Ok(()) => {
                info!(index = %self.index, "Flushed index");
                true
            }
            Err(e) => {
                warn!(index = %self.index, error = %e, "Index flush failed");
                false
            }
        }
    }

    /// Put the normal refresh interval back.
    ///
    /// Only valid once after `prepare`. A remote failure is logged and reported
    /// as `Ok(false)`: the documents are written even if they are not yet
    /// searchable.
    #[instrument(skip(self), fields(index = %self.index))]
    pub async fn restore(&mut self) -> Result<bool, PipelineError> {
        if self.state != LifecycleState::Prepared {
            return Err(PipelineError::lifecycle(format!(
                "Cannot restore index '{}' in state {:?}, prepare it first",
                self.index, self.state
            )));
        }

        let restored = match self
            .client
            .put_refresh_interval(&self.index, NORMAL_REFRESH_INTERVAL)
            .await
        {
            Ok(()) => {
                info!(refresh_interval = NORMAL_REFRESH_INTERVAL, "Index settings restored");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to restore refresh interval, documents may not be searchable yet");
                false
            }
        };

        self.state = LifecycleState::Restored;
        Ok(restored)
    }
}
