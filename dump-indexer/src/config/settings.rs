//! Indexer settings read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use dump_indexer_pipeline::loader::DEFAULT_BULK_SIZE_BYTES;
use dump_indexer_pipeline::{IndexingStrategy, LoaderConfig, OrchestratorConfig};
use dump_indexer_repository::config::DEFAULT_OPENSEARCH_URL;
use dump_indexer_repository::types::DEFAULT_DOC_TYPE;
use dump_indexer_repository::{ConnectionConfig, IndexTarget};
use dump_indexer_shared::WriteMode;

use crate::IndexingError;

/// Default name of the target index.
pub const DEFAULT_INDEX_NAME: &str = "dewiktionary";

/// Everything needed to run one bulk load.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub opensearch_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout: Option<Duration>,
    pub index_name: String,
    pub index_type: String,
    pub bulk_size_bytes: usize,
    pub drain_timeout: Duration,
    pub write_mode: WriteMode,
    pub strategy: IndexingStrategy,
    pub max_retries: u32,
    pub channel_buffer_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        let orchestrator = OrchestratorConfig::default();
        let loader = LoaderConfig::default();

        Self {
            opensearch_url: DEFAULT_OPENSEARCH_URL.to_string(),
            username: None,
            password: None,
            request_timeout: None,
            index_name: DEFAULT_INDEX_NAME.to_string(),
            index_type: DEFAULT_DOC_TYPE.to_string(),
            bulk_size_bytes: DEFAULT_BULK_SIZE_BYTES,
            drain_timeout: orchestrator.drain_timeout,
            write_mode: loader.write_mode,
            strategy: loader.strategy,
            max_retries: loader.max_retries,
            channel_buffer_size: orchestrator.channel_buffer_size,
        }
    }
}

impl IndexerConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_USERNAME` / `OPENSEARCH_PASSWORD`: basic auth credentials
    /// - `REQUEST_TIMEOUT_SECS`: per-request timeout
    /// - `INDEX_NAME`: target index (default: dewiktionary)
    /// - `INDEX_TYPE`: type segment of single-document paths (default: _doc)
    /// - `BULK_SIZE_BYTES`: bulk request size (default: 15 MB)
    /// - `DRAIN_TIMEOUT_SECS`: wait for outstanding writes (default: 300)
    /// - `WRITE_MODE`: `create` or `upsert` (default: create)
    /// - `INDEXING_STRATEGY`: `batched` or `concurrent` (default: batched)
    /// - `MAX_RETRIES`: retries for transient failures (default: 3)
    /// - `CHANNEL_BUFFER_SIZE`: pages buffered between reader and loader (default: 1000)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IndexingError> {
        let defaults = Self::default();
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let username = lookup("OPENSEARCH_USERNAME");
        let password = lookup("OPENSEARCH_PASSWORD");
        if username.is_some() != password.is_some() {
            return Err(IndexingError::config(
                "OPENSEARCH_USERNAME and OPENSEARCH_PASSWORD must be set together",
            ));
        }

        Ok(Self {
            opensearch_url: lookup("OPENSEARCH_URL").unwrap_or(defaults.opensearch_url),
            username,
            password,
            request_timeout: parse_optional::<u64>(&lookup, "REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs),
            index_name: lookup("INDEX_NAME").unwrap_or(defaults.index_name),
            index_type: lookup("INDEX_TYPE").unwrap_or(defaults.index_type),
            bulk_size_bytes: parse_optional(&lookup, "BULK_SIZE_BYTES")?
                .unwrap_or(defaults.bulk_size_bytes),
            drain_timeout: parse_optional::<u64>(&lookup, "DRAIN_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.drain_timeout),
            write_mode: parse_optional(&lookup, "WRITE_MODE")?.unwrap_or(defaults.write_mode),
            strategy: parse_optional(&lookup, "INDEXING_STRATEGY")?.unwrap_or(defaults.strategy),
            max_retries: parse_optional(&lookup, "MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            channel_buffer_size: parse_optional(&lookup, "CHANNEL_BUFFER_SIZE")?
                .unwrap_or(defaults.channel_buffer_size),
        })
        .and_then(Self::validated)
    }

    /// Reject values no run can work with.
    pub fn validated(self) -> Result<Self, IndexingError> {
        if self.index_name.is_empty() {
            return Err(IndexingError::config("Index name must not be empty"));
        }
        if self.bulk_size_bytes == 0 {
            return Err(IndexingError::config("BULK_SIZE_BYTES must be greater than zero"));
        }
        if self.channel_buffer_size == 0 {
            return Err(IndexingError::config("CHANNEL_BUFFER_SIZE must be greater than zero"));
        }
        Ok(self)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(&self.opensearch_url);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_credentials(username, password);
        }
        if let Some(timeout) = self.request_timeout {
            config = config.with_request_timeout(timeout);
        }
        config
    }

    pub fn index_target(&self) -> IndexTarget {
        IndexTarget::new(&self.index_name).with_doc_type(&self.index_type)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            strategy: self.strategy,
            write_mode: self.write_mode,
            bulk_size_bytes: self.bulk_size_bytes,
            max_retries: self.max_retries,
            ..Default::default()
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            channel_buffer_size: self.channel_buffer_size,
            drain_timeout: self.drain_timeout,
        }
    }
}

fn parse_optional<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, IndexingError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| IndexingError::config(format!("Invalid {} '{}': {}", key, value, e)))
        })
        .transpose()
}
