//! Loader module for the dump indexer pipeline.
//!
//! Moves page documents from the producer to the search index. Two strategies
//! share the `Loader` trait: `BatchLoader` sends `_bulk` requests of bounded
//! size with at most one request in flight, `ConcurrentLoader` spawns one write
//! per document. Both report every document's outcome to the `OutcomeTracker`.

mod batch_loader;
mod concurrent_loader;
mod retry;

pub use batch_loader::BatchLoader;
pub use concurrent_loader::ConcurrentLoader;
pub use retry::{RetryPolicy, Retryable};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::tracker::{OutcomeSummary, OutcomeTracker};
use dump_indexer_repository::{DocumentError, IndexTarget, SearchEngineClient, SerializedDocument};
use dump_indexer_shared::{PageDocument, WriteMode};

/// Default size of a bulk request body before it is sent.
pub const DEFAULT_BULK_SIZE_BYTES: usize = 15 * 1024 * 1024;

/// Result of waiting for outstanding writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// Every submitted document reached a terminal outcome.
    Completed,
    /// The wait ended before every document settled.
    TimedOut { outstanding: u64 },
}

impl DrainStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// How documents are sent to the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexingStrategy {
    /// Size-bounded `_bulk` requests, one in flight at a time.
    #[default]
    Batched,
    /// One write per document, all in flight at once.
    Concurrent,
}

impl fmt::Display for IndexingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batched => write!(f, "batched"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

impl FromStr for IndexingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batched" | "bulk" => Ok(Self::Batched),
            "concurrent" | "async" => Ok(Self::Concurrent),
            other => Err(format!(
                "Unknown indexing strategy '{}', expected 'batched' or 'concurrent'",
                other
            )),
        }
    }
}

/// Configuration for the loaders.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Which loader to build.
    pub strategy: IndexingStrategy,
    /// Create-only or upsert writes.
    pub write_mode: WriteMode,
    /// Serialized size at which a batch is sent.
    pub bulk_size_bytes: usize,
    /// Maximum number of retry attempts for transient failures.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds.
    pub max_retry_delay_ms: u64,
}

impl LoaderConfig {
    /// Retry schedule derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_retry_delay_ms),
            Duration::from_millis(self.max_retry_delay_ms),
        )
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strategy: IndexingStrategy::default(),
            write_mode: WriteMode::default(),
            bulk_size_bytes: DEFAULT_BULK_SIZE_BYTES,
            max_retries: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
        }
    }
}

/// A sink for page documents that records every outcome in a tracker.
///
/// `submit` never fails: documents that cannot be written are recorded as
/// failures. `drain` waits, bounded, until every submitted document settled.
#[async_trait]
pub trait Loader: Send {
    /// Hand a document to the loader.
    async fn submit(&mut self, document: PageDocument);

    /// Send anything still buffered and wait for outstanding writes.
    async fn drain(&mut self, timeout: Duration) -> DrainStatus;

    /// Tracker receiving the outcomes.
    fn tracker(&self) -> &Arc<OutcomeTracker>;

    /// Number of documents submitted so far.
    fn submitted(&self) -> u64;

    /// Final outcome summary. Call once, after `drain`.
    fn summarize(&self) -> Option<OutcomeSummary> {
        self.tracker().summarize()
    }
}

/// Build the loader selected by `config.strategy`.
pub fn build_loader(
    client: Arc<dyn SearchEngineClient>,
    target: IndexTarget,
    config: LoaderConfig,
) -> Box<dyn Loader> {
    info!(
        strategy = %config.strategy,
        write_mode = %config.write_mode,
        index = %target.index,
        "Building loader"
    );

    match config.strategy {
        IndexingStrategy::Batched => Box::new(BatchLoader::new(client, target, config)),
        IndexingStrategy::Concurrent => Box::new(ConcurrentLoader::new(client, target, config)),
    }
}

/// Serialize a page into the document source stored in the index.
pub fn serialize_document(document: &PageDocument) -> Result<SerializedDocument, DocumentError> {
    let source =
        serde_json::to_vec(document).map_err(|e| DocumentError::serialization(e.to_string()))?;
    Ok(SerializedDocument::new(document.identity(), source))
}

/// Record the terminal outcome of one document write.
///
/// A create-only write that conflicts after an earlier attempt may have been
/// applied has found its own document, so it is recorded as a success.
pub(crate) fn record_outcome(
    tracker: &OutcomeTracker,
    mode: WriteMode,
    identity: String,
    result: Result<(), DocumentError>,
    earlier_may_have_applied: bool,
) {
    match result {
        Ok(()) => tracker.record_success(),
        Err(e) if e.is_conflict() && mode == WriteMode::CreateOnly && earlier_may_have_applied => {
            warn!(
                identity = %identity,
                "Conflict after an unacknowledged attempt, counting the earlier write"
            );
            tracker.record_success();
        }
        Err(e) => {
            debug!(identity = %identity, error = %e, "Document write failed");
            tracker.record_failure(identity, e);
        }
    }
}

/// Wait until `submitted` outcomes have been recorded or `timeout` elapses.
pub(crate) async fn wait_for_outcomes(
    tracker: &OutcomeTracker,
    submitted: u64,
    timeout: Duration,
) -> DrainStatus {
    match tracker.wait_settled(submitted, timeout).await {
        Ok(()) => {
            info!(submitted, "All submitted documents settled");
            DrainStatus::Completed
        }
        Err(settled) => {
            let outstanding = submitted.saturating_sub(settled);
            warn!(
                submitted,
                settled,
                outstanding,
                timeout_secs = timeout.as_secs(),
                "Drain timed out with writes still outstanding"
            );
            DrainStatus::TimedOut { outstanding }
        }
    }
}
