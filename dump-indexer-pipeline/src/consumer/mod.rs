//! Consumer module for the dump indexer pipeline.
//!
//! Reads pages from a MediaWiki XML dump and turns the reader's callbacks into
//! `PageDocument`s sent to the orchestrator.

mod dump_reader;
mod messages;
mod page_collector;

pub use dump_reader::DumpReader;
pub use messages::StreamMessage;
pub use page_collector::{CollectorState, PageCollector, PageHandler, PageSource, MAIN_NAMESPACE};
