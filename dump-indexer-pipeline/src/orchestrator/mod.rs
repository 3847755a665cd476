//! Orchestrator module for the dump indexer pipeline.
//!
//! Runs one bulk load: prepares the index, streams pages from the dump reader
//! into the loader, then drains, reports and restores the index.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::{PageCollector, PageSource, StreamMessage};
use crate::errors::PipelineError;
use crate::lifecycle::IndexLifecycle;
use crate::loader::{DrainStatus, Loader};
use crate::tracker::OutcomeSummary;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the page channel buffer between the dump reader and the loader.
    pub channel_buffer_size: usize,
    /// Upper bound on the wait for outstanding writes at the end of the run.
    pub drain_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            drain_timeout: Duration::from_secs(300),
        }
    }
}

/// Stages of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Prepared,
    Streaming,
    Draining,
    Reported,
    Restored,
    Closed,
}

/// What happened during a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Outcome counts and failed documents.
    pub summary: OutcomeSummary,
    /// Documents handed to the loader.
    pub submitted: u64,
    /// Whether every write settled before the drain timeout.
    pub drain: DrainStatus,
    /// Whether the normal refresh interval was put back.
    pub restored: bool,
    /// Whether the run was stopped by a shutdown signal.
    pub interrupted: bool,
    /// Whether streaming stopped because the loader accepted no page for a
    /// whole drain timeout.
    pub stalled: bool,
    /// Last state reached.
    pub state: RunState,
}

/// Orchestrator that coordinates the pipeline components.
///
/// The orchestrator:
/// - Prepares the index before the first page is read
/// - Feeds pages from a blocking dump reader into the loader
/// - Handles shutdown signals
/// - Drains, reports and restores the index exactly once after a successful prepare
pub struct Orchestrator {
    lifecycle: IndexLifecycle,
    loader: Box<dyn Loader>,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(lifecycle: IndexLifecycle, loader: Box<dyn Loader>) -> Self {
        Self::with_config(lifecycle, loader, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        lifecycle: IndexLifecycle,
        loader: Box<dyn Loader>,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            lifecycle,
            loader,
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Trigger a graceful shutdown. Streaming stops and the run finishes normally.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Sender that triggers a shutdown from elsewhere once `run` owns the orchestrator.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the bulk load from `source`.
    ///
    /// A failed prepare aborts the run before any page is read. After that the
    /// run always drains, reports and restores the index; a dump reader error
    /// is returned only once that is done.
    #[instrument(skip_all, fields(index = %self.lifecycle.index()))]
    pub async fn run<S: PageSource>(self, source: S) -> Result<RunReport, PipelineError> {
        let Orchestrator {
            mut lifecycle,
            mut loader,
            config,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
        } = self;
        let mut state = RunState::Start;

        info!("Starting dump indexer");
        lifecycle.prepare().await?;
        advance(&mut state, RunState::Prepared);

        let (tx, mut rx) = mpsc::channel::<StreamMessage>(config.channel_buffer_size);
        let producer = tokio::task::spawn_blocking(move || {
            let mut collector = PageCollector::new(tx);
            source.read(&mut collector)
        });
        advance(&mut state, RunState::Streaming);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut ctrl_c_enabled = true;
        let mut interrupted = false;
        let mut stalled = false;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let document = match msg {
                        Some(StreamMessage::Page(document)) => document,
                        Some(StreamMessage::End) | None => {
                            info!(submitted = loader.submitted(), "Dump stream ended");
                            break;
                        }
                    };

                    // A full batch waits for the request in flight, so keep
                    // listening for shutdown while it does.
                    let submit = tokio::time::timeout(config.drain_timeout, loader.submit(document));
                    tokio::pin!(submit);
                    loop {
                        tokio::select! {
                            biased;
                            result = &mut submit => {
                                if result.is_err() {
                                    error!(
                                        timeout_secs = config.drain_timeout.as_secs(),
                                        "Loader accepted no page within the drain timeout, stopping"
                                    );
                                    stalled = true;
                                }
                                break;
                            }
                            result = &mut ctrl_c, if ctrl_c_enabled => {
                                if on_ctrl_c(result, &mut ctrl_c_enabled) {
                                    interrupted = true;
                                    break;
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                info!("Shutdown requested");
                                interrupted = true;
                                break;
                            }
                        }
                    }
                    if interrupted || stalled {
                        break;
                    }
                }
                result = &mut ctrl_c, if ctrl_c_enabled => {
                    if on_ctrl_c(result, &mut ctrl_c_enabled) {
                        interrupted = true;
                        break;
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    interrupted = true;
                    break;
                }
            }
        }

        // Unblocks the reader if it is waiting on a full channel.
        drop(rx);
        let read_result = match producer.await {
            Ok(Err(PipelineError::ChannelError(_))) if interrupted || stalled => Ok(()),
            Ok(result) => result,
            Err(e) => Err(PipelineError::consumer(format!("Dump reader task failed: {}", e))),
        };

        let stop = StopReason { interrupted, stalled };
        let report = finish(loader, lifecycle, config.drain_timeout, state, stop).await;

        match read_result {
            Ok(()) => Ok(report),
            Err(e) => {
                error!(error = %e, "Dump reading failed, index was left in its restored state");
                Err(e)
            }
        }
    }
}

/// Why streaming ended before the dump did, if it did.
#[derive(Debug, Clone, Copy)]
struct StopReason {
    interrupted: bool,
    stalled: bool,
}

/// Handle the Ctrl-C listener completing. Returns whether to stop streaming.
fn on_ctrl_c(result: std::io::Result<()>, enabled: &mut bool) -> bool {
    match result {
        Ok(()) => {
            info!("Received shutdown signal");
            true
        }
        Err(e) => {
            warn!(error = %e, "Could not listen for shutdown signal");
            *enabled = false;
            false
        }
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug!(from = ?state, to = ?next, "Run state");
    *state = next;
}

/// Drain, report, flush, restore and release, in that order.
///
/// Takes the loader and the lifecycle by value so it can only happen once.
async fn finish(
    mut loader: Box<dyn Loader>,
    mut lifecycle: IndexLifecycle,
    drain_timeout: Duration,
    mut state: RunState,
    stop: StopReason,
) -> RunReport {
    advance(&mut state, RunState::Draining);
    let drain = loader.drain(drain_timeout).await;

    let summary = loader.summarize().unwrap_or_default();
    summary.log();
    advance(&mut state, RunState::Reported);

    lifecycle.flush().await;
    let restored = match lifecycle.restore().await {
        Ok(restored) => restored,
        Err(e) => {
            error!(error = %e, "Index restore rejected");
            false
        }
    };
    advance(&mut state, RunState::Restored);

    let submitted = loader.submitted();
    drop(loader);
    drop(lifecycle);
    info!("Released search client");
    advance(&mut state, RunState::Closed);

    RunReport {
        summary,
        submitted,
        drain,
        restored,
        interrupted: stop.interrupted,
        stalled: stop.stalled,
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::thread;

    use crate::consumer::{DumpReader, PageHandler};
    use crate::loader::{build_loader, IndexingStrategy, LoaderConfig};
    use crate::test_support::MockSearchClient;
    use dump_indexer_repository::IndexTarget;
    use dump_indexer_shared::WriteMode;

    const INDEX: &str = "dewiktionary";

    const DUMP: &str = r#"<mediawiki>
  <siteinfo>
    <namespaces>
      <namespace key="0" />
      <namespace key="1">Talk</namespace>
    </namespaces>
  </siteinfo>
  <page><title>apple</title><ns>0</ns><revision><text>a fruit</text></revision></page>
  <page><title>banana</title><ns>0</ns><revision><text>a fruit</text></revision></page>
  <page><title>Talk:apple</title><ns>1</ns><revision><text>discussion</text></revision></page>
</mediawiki>"#;

    fn orchestrator(
        client: &Arc<MockSearchClient>,
        strategy: IndexingStrategy,
        write_mode: WriteMode,
    ) -> Orchestrator {
        let config = LoaderConfig {
            strategy,
            write_mode,
            ..Default::default()
        };
        let loader = build_loader(client.clone(), IndexTarget::new(INDEX), config);
        Orchestrator::new(IndexLifecycle::new(client.clone(), INDEX), loader)
    }

    /// Batched loader that sends every page as its own bulk request.
    fn one_page_batches(client: &Arc<MockSearchClient>, drain_timeout: Duration) -> Orchestrator {
        let config = LoaderConfig {
            bulk_size_bytes: 1,
            ..Default::default()
        };
        let loader = build_loader(client.clone(), IndexTarget::new(INDEX), config);
        Orchestrator::with_config(
            IndexLifecycle::new(client.clone(), INDEX),
            loader,
            OrchestratorConfig {
                drain_timeout,
                ..Default::default()
            },
        )
    }

    fn reader(xml: &'static str) -> DumpReader {
        DumpReader::from_reader(Cursor::new(xml))
    }

    /// Emits a page every few milliseconds until the pipeline stops listening.
    struct EndlessSource;

    impl PageSource for EndlessSource {
        fn read(self, handler: &mut dyn PageHandler) -> Result<(), PipelineError> {
            let mut n = 0u64;
            let result = loop {
                handler.on_page_start();
                handler.set_title(&format!("word{}", n), "Main");
                handler.set_text("text");
                if let Err(e) = handler.on_page_end() {
                    break Err(e);
                }
                n += 1;
                thread::sleep(Duration::from_millis(2));
            };
            handler.on_close();
            result
        }
    }

    #[tokio::test]
    async fn test_indexes_dump_with_each_strategy() {
        for strategy in [IndexingStrategy::Batched, IndexingStrategy::Concurrent] {
            let client = Arc::new(MockSearchClient::new());
            let report = orchestrator(&client, strategy, WriteMode::CreateOnly)
                .run(reader(DUMP))
                .await
                .unwrap();

            assert_eq!(report.summary.successes, 3);
            assert_eq!(report.summary.failures, 0);
            assert_eq!(report.submitted, 3);
            assert_eq!(report.drain, DrainStatus::Completed);
            assert!(report.restored);
            assert!(!report.interrupted);
            assert_eq!(report.state, RunState::Closed);

            for identity in ["Main:apple", "Main:banana", "Talk:apple"] {
                assert!(client.document(INDEX, identity).is_some(), "{} missing", identity);
            }
            let talk = client.document(INDEX, "Talk:apple").unwrap();
            assert_eq!(talk["text"], serde_json::json!(["discussion"]));
            assert_eq!(client.refresh_interval(INDEX).as_deref(), Some("1s"));
            assert_eq!(client.flush_calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_duplicate_pages_by_write_mode() {
        const DUPLICATES: &str = r#"<mediawiki>
  <page><title>apple</title><revision><text>a fruit</text></revision></page>
  <page><title>apple</title><revision><text>a tree</text></revision></page>
</mediawiki>"#;

        let client = Arc::new(MockSearchClient::new());
        let report = orchestrator(&client, IndexingStrategy::Batched, WriteMode::CreateOnly)
            .run(reader(DUPLICATES))
            .await
            .unwrap();
        assert_eq!(report.summary.successes, 1);
        assert_eq!(report.summary.failures, 1);
        assert_eq!(report.summary.conflicts(), 1);
        assert_eq!(report.summary.total(), report.submitted);

        let client = Arc::new(MockSearchClient::new());
        let report = orchestrator(&client, IndexingStrategy::Batched, WriteMode::Upsert)
            .run(reader(DUPLICATES))
            .await
            .unwrap();
        assert_eq!(report.summary.successes, 2);
        assert_eq!(report.summary.failures, 0);
        let stored = client.document(INDEX, "Main:apple").unwrap();
        assert_eq!(stored["text"], serde_json::json!(["a tree"]));
    }

    #[tokio::test]
    async fn test_prepare_failure_aborts_before_reading() {
        let client = Arc::new(MockSearchClient::new());
        client.set_fail_create(true);

        let result = orchestrator(&client, IndexingStrategy::Batched, WriteMode::CreateOnly)
            .run(reader(DUMP))
            .await;

        assert!(matches!(result, Err(PipelineError::SearchError(_))));
        assert_eq!(client.bulk_calls(), 0);
        assert_eq!(client.settings_calls(), 0);
    }

    #[tokio::test]
    async fn test_parse_error_returned_after_restore() {
        const BROKEN: &str = r#"<mediawiki>
  <page><title>apple</title><revision><text>a fruit</text></revision></page>
  <page><title>banana</title></revision>
</mediawiki>"#;

        let client = Arc::new(MockSearchClient::new());
        let result = orchestrator(&client, IndexingStrategy::Concurrent, WriteMode::CreateOnly)
            .run(reader(BROKEN))
            .await;

        assert!(matches!(result, Err(PipelineError::ParseError(_))));
        assert_eq!(client.document_count(INDEX), 1);
        assert_eq!(client.refresh_interval(INDEX).as_deref(), Some("1s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout_still_restores() {
        let client = Arc::new(MockSearchClient::new());
        client.set_hang(true);

        let report = orchestrator(&client, IndexingStrategy::Concurrent, WriteMode::CreateOnly)
            .run(reader(DUMP))
            .await
            .unwrap();

        assert_eq!(report.drain, DrainStatus::TimedOut { outstanding: 3 });
        assert_eq!(report.summary.total(), 0);
        assert!(report.restored);
        assert_eq!(report.state, RunState::Closed);
        assert_eq!(client.refresh_interval(INDEX).as_deref(), Some("1s"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_streaming_and_finishes() {
        let client = Arc::new(MockSearchClient::new());
        let orchestrator = orchestrator(&client, IndexingStrategy::Concurrent, WriteMode::CreateOnly);
        let shutdown = orchestrator.shutdown_handle();

        let run = tokio::spawn(orchestrator.run(EndlessSource));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.send(()).unwrap();
        let report = run.await.unwrap().unwrap();

        assert!(report.interrupted);
        assert_eq!(report.drain, DrainStatus::Completed);
        assert_eq!(report.summary.total(), report.submitted);
        assert_eq!(client.document_count(INDEX) as u64, report.summary.successes);
        assert_eq!(client.refresh_interval(INDEX).as_deref(), Some("1s"));
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_on_hung_bulk_request() {
        let client = Arc::new(MockSearchClient::new());
        client.set_hang(true);
        let orchestrator = one_page_batches(&client, Duration::from_secs(1));
        let shutdown = orchestrator.shutdown_handle();

        let run = tokio::spawn(orchestrator.run(reader(DUMP)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.send(()).unwrap();

        let report = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("run did not finish after shutdown")
            .unwrap()
            .unwrap();

        assert!(report.interrupted);
        assert!(!report.stalled);
        assert_eq!(report.drain, DrainStatus::TimedOut { outstanding: 2 });
        assert!(report.restored);
        assert_eq!(client.bulk_calls(), 1);
        assert_eq!(client.refresh_interval(INDEX).as_deref(), Some("1s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_bulk_request_stops_streaming_and_restores() {
        let client = Arc::new(MockSearchClient::new());
        client.set_hang(true);

        let report = one_page_batches(&client, Duration::from_secs(30))
            .run(reader(DUMP))
            .await
            .unwrap();

        assert!(report.stalled);
        assert!(!report.interrupted);
        assert_eq!(report.submitted, 2);
        assert_eq!(report.drain, DrainStatus::TimedOut { outstanding: 2 });
        assert!(report.restored);
        assert_eq!(report.state, RunState::Closed);
        assert_eq!(client.refresh_interval(INDEX).as_deref(), Some("1s"));
    }
}
