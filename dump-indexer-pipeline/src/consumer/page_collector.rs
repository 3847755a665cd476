//! Page callbacks and the collector that turns them into documents.
//!
//! A dump reader drives a `PageHandler` with one callback per page event. The
//! `PageCollector` keeps the page under construction as an owned builder and
//! hands the finished `PageDocument` to the pipeline channel on page end.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::consumer::messages::StreamMessage;
use crate::errors::PipelineError;
use dump_indexer_shared::PageDocument;

/// Namespace name used for pages in the main (unnamed) namespace.
pub const MAIN_NAMESPACE: &str = "Main";

/// Callbacks emitted by a dump reader, in order, for every page:
/// `on_page_start`, any number of setters, `on_page_end`. `on_close` is called
/// exactly once when the reader stops, whether or not it finished the dump.
pub trait PageHandler {
    /// A new page begins.
    fn on_page_start(&mut self);

    /// Title of the current page, without namespace prefix, and its namespace name.
    fn set_title(&mut self, title: &str, namespace: &str);

    /// Wikitext of the current page's revision.
    fn set_text(&mut self, text: &str);

    /// Contributor of the current revision.
    fn set_author(&mut self, _author: &str) {}

    /// Revision id of the current page.
    fn set_revision(&mut self, _revision: u64) {}

    /// Timestamp of the current revision.
    fn set_timestamp(&mut self, _timestamp: &str) {}

    /// Page id of the current page.
    fn set_page_id(&mut self, _page_id: u64) {}

    /// The current page is complete.
    ///
    /// Returns an error when the page cannot be delivered, which tells the
    /// reader to stop.
    fn on_page_end(&mut self) -> Result<(), PipelineError>;

    /// The reader has stopped.
    fn on_close(&mut self);
}

/// A producer of page callbacks, run on a blocking thread.
pub trait PageSource: Send + 'static {
    /// Read every page, driving `handler`, and call `handler.on_close()` once at the end.
    fn read(self, handler: &mut dyn PageHandler) -> Result<(), PipelineError>;
}

/// Fields collected for the page under construction.
#[derive(Debug, Default)]
pub struct PageBuilder {
    namespace: Option<String>,
    title: Option<String>,
    text: Option<String>,
}

impl PageBuilder {
    fn build(self) -> Option<PageDocument> {
        let title = self.title.filter(|t| !t.is_empty())?;
        let namespace = self
            .namespace
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| MAIN_NAMESPACE.to_string());

        Some(PageDocument::from_text(
            namespace,
            title,
            self.text.as_deref().unwrap_or_default(),
        ))
    }
}

/// State of the collector between callbacks.
#[derive(Debug)]
pub enum CollectorState {
    /// No page is open.
    Idle,
    /// A page is open and fields are being collected.
    BuildingPage(PageBuilder),
    /// A page is complete and waiting to be handed off.
    Ready(PageDocument),
}

/// `PageHandler` that sends finished pages to the pipeline channel.
pub struct PageCollector {
    state: CollectorState,
    tx: mpsc::Sender<StreamMessage>,
    pages: u64,
    skipped: u64,
    closed: bool,
}

impl PageCollector {
    /// Create a collector that delivers pages to `tx`.
    pub fn new(tx: mpsc::Sender<StreamMessage>) -> Self {
        Self {
            state: CollectorState::Idle,
            tx,
            pages: 0,
            skipped: 0,
            closed: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> &CollectorState {
        &self.state
    }

    /// Number of pages delivered.
    pub fn pages(&self) -> u64 {
        self.pages
    }

    /// Number of pages dropped because they had no title.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn builder(&mut self) -> Option<&mut PageBuilder> {
        match self.state {
            CollectorState::BuildingPage(ref mut builder) => Some(builder),
            _ => None,
        }
    }

    /// Hand a ready page off to the channel and return to `Idle`.
    fn deliver(&mut self) -> Result<(), PipelineError> {
        if let CollectorState::Ready(document) =
            std::mem::replace(&mut self.state, CollectorState::Idle)
        {
            self.tx
                .blocking_send(StreamMessage::Page(document))
                .map_err(|_| PipelineError::channel("Pipeline receiver closed"))?;
            self.pages += 1;
        }
        Ok(())
    }
}

impl PageHandler for PageCollector {
    fn on_page_start(&mut self) {
        if let CollectorState::BuildingPage(_) = self.state {
            warn!("Page started before the previous page ended, discarding it");
            self.skipped += 1;
        }
        self.state = CollectorState::BuildingPage(PageBuilder::default());
    }

    fn set_title(&mut self, title: &str, namespace: &str) {
        match self.builder() {
            Some(builder) => {
                builder.title = Some(title.to_string());
                builder.namespace = Some(namespace.to_string());
            }
            None => debug!(title, "Title outside of a page ignored"),
        }
    }

    fn set_text(&mut self, text: &str) {
        match self.builder() {
            Some(builder) => builder.text = Some(text.to_string()),
            None => debug!("Text outside of a page ignored"),
        }
    }

    fn on_page_end(&mut self) -> Result<(), PipelineError> {
        self.state = match std::mem::replace(&mut self.state, CollectorState::Idle) {
            CollectorState::BuildingPage(builder) => match builder.build() {
                Some(document) => CollectorState::Ready(document),
                None => {
                    warn!("Page without a title skipped");
                    self.skipped += 1;
                    CollectorState::Idle
                }
            },
            CollectorState::Idle => {
                warn!("Page end without a page start");
                CollectorState::Idle
            }
            ready @ CollectorState::Ready(_) => ready,
        };

        self.deliver()
    }

    fn on_close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let CollectorState::BuildingPage(_) = self.state {
            warn!("Dump closed in the middle of a page, discarding it");
            self.skipped += 1;
        }
        self.state = CollectorState::Idle;

        // The receiver may already be gone when the pipeline was interrupted.
        let _ = self.tx.blocking_send(StreamMessage::End);
        info!(
            pages = self.pages,
            skipped = self.skipped,
            "Dump reader closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> (PageCollector, mpsc::Receiver<StreamMessage>) {
        let (tx, rx) = mpsc::channel(16);
        (PageCollector::new(tx), rx)
    }

    fn next_page(rx: &mut mpsc::Receiver<StreamMessage>) -> PageDocument {
        match rx.try_recv() {
            Ok(StreamMessage::Page(document)) => document,
            other => panic!("expected a page, got {:?}", other),
        }
    }

    #[test]
    fn test_page_lifecycle() {
        let (mut collector, mut rx) = collector();

        assert!(matches!(collector.state(), CollectorState::Idle));
        collector.on_page_start();
        assert!(matches!(collector.state(), CollectorState::BuildingPage(_)));

        collector.set_page_id(7);
        collector.set_author("someone");
        collector.set_title("apple", "Main");
        collector.set_text("a fruit");
        collector.on_page_end().unwrap();

        assert!(matches!(collector.state(), CollectorState::Idle));
        let page = next_page(&mut rx);
        assert_eq!(page.identity(), "Main:apple");
        assert_eq!(page.text, vec!["a fruit"]);
        assert_eq!(collector.pages(), 1);
    }

    #[test]
    fn test_missing_namespace_defaults_to_main() {
        let (mut collector, mut rx) = collector();

        collector.on_page_start();
        collector.set_title("banana", "");
        collector.on_page_end().unwrap();

        let page = next_page(&mut rx);
        assert_eq!(page.identity(), "Main:banana");
        assert!(page.text.is_empty());
    }

    #[test]
    fn test_page_without_title_is_skipped() {
        let (mut collector, mut rx) = collector();

        collector.on_page_start();
        collector.set_text("orphan text");
        collector.on_page_end().unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(collector.skipped(), 1);
        assert_eq!(collector.pages(), 0);
    }

    #[test]
    fn test_setters_outside_page_are_ignored() {
        let (mut collector, mut rx) = collector();

        collector.set_title("stray", "Main");
        collector.on_page_end().unwrap();

        assert!(rx.try_recv().is_err());
        assert!(matches!(collector.state(), CollectorState::Idle));
    }

    #[test]
    fn test_close_sends_end_once() {
        let (mut collector, mut rx) = collector();

        collector.on_page_start();
        collector.on_close();
        collector.on_close();

        assert!(matches!(rx.try_recv(), Ok(StreamMessage::End)));
        assert!(rx.try_recv().is_err());
        assert_eq!(collector.skipped(), 1);
    }

    #[test]
    fn test_page_end_fails_when_receiver_dropped() {
        let (mut collector, rx) = collector();
        drop(rx);

        collector.on_page_start();
        collector.set_title("apple", "Main");
        let result = collector.on_page_end();

        assert!(matches!(result, Err(PipelineError::ChannelError(_))));
    }
}
