//! # Dump Indexer Repository
//!
//! This crate provides the search engine interface used by the dump indexer
//! pipeline. It includes definitions for errors, the `SearchEngineClient`
//! trait, and a concrete implementation for OpenSearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;

pub use config::{BasicAuth, ConnectionConfig};
pub use errors::{DocumentError, SearchError};
pub use interfaces::SearchEngineClient;
pub use opensearch::OpenSearchClient;
pub use types::{BulkItemOutcome, IndexSettings, IndexTarget, SerializedDocument};
