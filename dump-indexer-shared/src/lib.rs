//! # Dump Indexer Shared
//!
//! Types shared by every layer of the dump indexer: the page document
//! produced for each dictionary page and the write mode used when it is
//! sent to the search index.

mod document;
mod write_mode;

pub use document::{PageDocument, IDENTITY_SEPARATOR};
pub use write_mode::{ParseWriteModeError, WriteMode};
