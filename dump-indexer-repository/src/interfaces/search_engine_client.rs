//! Search engine client trait definition.
//!
//! This module defines the abstract interface for the index operations the
//! dump indexer needs, allowing different backend implementations (OpenSearch,
//! Elasticsearch, test doubles).

use async_trait::async_trait;

use crate::errors::{DocumentError, SearchError};
use crate::types::{BulkItemOutcome, IndexSettings, IndexTarget, SerializedDocument};
use dump_indexer_shared::WriteMode;

/// Abstract interface for search engine operations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one client is shared by the producer
/// and every in-flight write task.
///
/// # Error Handling
///
/// Index-level operations return `SearchError`. Single-document writes return
/// `DocumentError`, which is recorded per document rather than propagated.
#[async_trait]
pub trait SearchEngineClient: Send + Sync {
    /// Delete an index.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The index existed and was deleted
    /// * `Ok(false)` - There was no index with that name
    /// * `Err(SearchError)` - The deletion failed for any other reason
    async fn delete_index(&self, index: &str) -> Result<bool, SearchError>;

    /// Create an index with fixed shard and replica counts.
    async fn create_index(&self, index: &str, settings: &IndexSettings) -> Result<(), SearchError>;

    /// Set the `refresh_interval` of an index (`"0"` disables periodic refresh).
    async fn put_refresh_interval(&self, index: &str, interval: &str) -> Result<(), SearchError>;

    /// Flush an index so written documents are persisted.
    async fn flush_index(&self, index: &str) -> Result<(), SearchError>;

    /// Write a single document.
    ///
    /// With `WriteMode::CreateOnly` an existing document with the same id yields
    /// `DocumentError::Conflict`; with `WriteMode::Upsert` it is overwritten.
    async fn write_document(
        &self,
        target: &IndexTarget,
        document: &SerializedDocument,
        mode: WriteMode,
    ) -> Result<(), DocumentError>;

    /// Write many documents in one bulk request.
    ///
    /// # Returns
    ///
    /// * `Ok(outcomes)` - One outcome per submitted document, in submission order
    /// * `Err(SearchError)` - The request as a whole failed; no document outcome is known
    async fn bulk_write(
        &self,
        target: &IndexTarget,
        documents: &[SerializedDocument],
        mode: WriteMode,
    ) -> Result<Vec<BulkItemOutcome>, SearchError>;

    /// Check if the search engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchError>;
}
