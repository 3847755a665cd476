//! Search error types.
//!
//! This module defines the error types that can occur during index-level
//! operations against the search engine.

use thiserror::Error;

/// Errors that can occur during search engine operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Failed to set up the connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete (network failure, timeout, broken connection).
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The search engine is overloaded and asked the client to back off.
    #[error("Search engine throttled the request with status {status}: {body}")]
    Throttled { status: u16, body: String },

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to delete the search index.
    #[error("Index deletion error: {0}")]
    IndexDeletionError(String),

    /// Failed to update index settings.
    #[error("Settings error: {0}")]
    SettingsError(String),

    /// Failed to flush the index.
    #[error("Flush error: {0}")]
    FlushError(String),

    /// The bulk request as a whole was rejected.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// Failed to parse response from search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create an index deletion error.
    pub fn index_deletion(msg: impl Into<String>) -> Self {
        Self::IndexDeletionError(msg.into())
    }

    /// Create a settings error.
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::SettingsError(msg.into())
    }

    /// Create a flush error.
    pub fn flush(msg: impl Into<String>) -> Self {
        Self::FlushError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportError(_) | Self::Throttled { .. })
    }

    /// Whether a failed write request may still have been executed.
    pub fn may_have_applied(&self) -> bool {
        matches!(self, Self::TransportError(_))
    }
}
