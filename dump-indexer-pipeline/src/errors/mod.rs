//! Error types for the dump indexer pipeline.

use dump_indexer_repository::SearchError;
use thiserror::Error;

/// Errors that can occur in the dump indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error from the dump reader or page collector.
    #[error("Consumer error: {0}")]
    ConsumerError(String),

    /// Error from the index lifecycle manager.
    #[error("Lifecycle error: {0}")]
    LifecycleError(String),

    /// Error from the search engine.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),

    /// Error parsing the XML dump.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// IO error while reading the dump.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a consumer error.
    pub fn consumer(msg: impl Into<String>) -> Self {
        Self::ConsumerError(msg.into())
    }

    /// Create a lifecycle error.
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::LifecycleError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }
}

impl From<quick_xml::Error> for PipelineError {
    fn from(err: quick_xml::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}
