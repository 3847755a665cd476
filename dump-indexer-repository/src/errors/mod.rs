//! Error types for the dump indexer repository.

mod document_error;
mod search_error;

pub use document_error::DocumentError;
pub use search_error::SearchError;
