//! # Dump Indexer Pipeline
//!
//! This crate provides the pipeline components for bulk loading a MediaWiki
//! XML dump into OpenSearch.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Reads the dump on a blocking thread and builds page documents
//! 2. **Loader**: Sends documents to the index, batched or one write per document
//! 3. **Tracker**: Collects the outcome of every document
//! 4. **Lifecycle**: Recreates the index and restores its settings afterwards
//! 5. **Orchestrator**: Runs prepare, streaming, drain, report and restore in order

pub mod consumer;
pub mod errors;
pub mod lifecycle;
pub mod loader;
pub mod orchestrator;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use consumer::{DumpReader, PageCollector, PageHandler, PageSource};
pub use errors::PipelineError;
pub use lifecycle::{IndexLifecycle, LifecycleState};
pub use loader::{build_loader, DrainStatus, IndexingStrategy, Loader, LoaderConfig};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunReport, RunState};
pub use tracker::{OutcomeSummary, OutcomeTracker, FAILURE_TARGET};
