//! Message types for the consumer.
//!
//! Defines the messages that flow from the dump reader thread to the orchestrator.

use dump_indexer_shared::PageDocument;

/// Messages that flow through the pipeline channel.
#[derive(Debug)]
pub enum StreamMessage {
    /// A fully populated page.
    Page(PageDocument),
    /// The dump reader closed; no more pages will follow.
    End,
}
