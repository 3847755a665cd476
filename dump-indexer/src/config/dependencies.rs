//! Dependency initialization and wiring for the dump indexer.

use std::sync::Arc;
use tracing::info;

use crate::config::IndexerConfig;
use crate::IndexingError;
use dump_indexer_pipeline::{build_loader, IndexLifecycle, Orchestrator};
use dump_indexer_repository::{OpenSearchClient, SearchEngineClient};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Connect to OpenSearch and build the pipeline described by `config`.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If the client cannot be built or the cluster is not reachable
    pub async fn new(config: &IndexerConfig) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %config.opensearch_url,
            index = %config.index_name,
            strategy = %config.strategy,
            write_mode = %config.write_mode,
            "Initializing dependencies"
        );

        let search_client = OpenSearchClient::new(&config.connection_config())
            .map_err(|e| IndexingError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        // Verify OpenSearch is reachable
        let healthy = search_client
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");

        Ok(Self::with_client(Arc::new(search_client), config))
    }

    /// Build the pipeline around an existing client.
    pub fn with_client(client: Arc<dyn SearchEngineClient>, config: &IndexerConfig) -> Self {
        let lifecycle = IndexLifecycle::new(client.clone(), &config.index_name);
        let loader = build_loader(client, config.index_target(), config.loader_config());
        let orchestrator = Orchestrator::with_config(lifecycle, loader, config.orchestrator_config());

        Self { orchestrator }
    }
}
