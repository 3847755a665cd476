//! Bulk loader with one request in flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::loader::{
    record_outcome, serialize_document, wait_for_outcomes, DrainStatus, Loader, LoaderConfig,
    RetryPolicy,
};
use crate::tracker::OutcomeTracker;
use dump_indexer_repository::{DocumentError, IndexTarget, SearchEngineClient, SerializedDocument};
use dump_indexer_shared::{PageDocument, WriteMode};

/// Loader that accumulates documents and sends them as `_bulk` requests.
///
/// A batch is sent once its serialized size reaches `bulk_size_bytes`. The
/// request runs on its own task; when the next batch is full before that task
/// finishes, `submit` waits for it.
pub struct BatchLoader {
    client: Arc<dyn SearchEngineClient>,
    target: Arc<IndexTarget>,
    config: LoaderConfig,
    tracker: Arc<OutcomeTracker>,
    pending: Vec<SerializedDocument>,
    pending_bytes: usize,
    in_flight: Option<JoinHandle<()>>,
    submitted: u64,
    batches: u64,
}

impl BatchLoader {
    pub fn new(client: Arc<dyn SearchEngineClient>, target: IndexTarget, config: LoaderConfig) -> Self {
        Self {
            client,
            target: Arc::new(target),
            config,
            tracker: Arc::new(OutcomeTracker::new()),
            pending: Vec::new(),
            pending_bytes: 0,
            in_flight: None,
            submitted: 0,
            batches: 0,
        }
    }

    /// Wait for the request in flight, if any.
    ///
    /// Cancel safe: the handle is only cleared once the request has finished,
    /// so a dropped wait leaves it in place for the next one.
    async fn await_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.as_mut() {
            if let Err(e) = handle.await {
                error!(error = %e, "Bulk request task failed");
            }
            self.in_flight = None;
        }
    }

    /// Send the pending batch once the previous request has completed.
    #[instrument(skip(self), fields(documents = self.pending.len(), bytes = self.pending_bytes))]
    async fn flush(&mut self) {
        self.await_in_flight().await;

        if self.pending.is_empty() {
            return;
        }

        let documents = std::mem::take(&mut self.pending);
        self.pending_bytes = 0;
        self.batches += 1;
        debug!(batch = self.batches, count = documents.len(), "Sending bulk request");

        let client = self.client.clone();
        let target = self.target.clone();
        let tracker = self.tracker.clone();
        let mode = self.config.write_mode;
        let retry = self.config.retry_policy();

        self.in_flight = Some(tokio::spawn(async move {
            send_batch(client, target, tracker, documents, mode, retry).await;
        }));
    }
}

/// Send one batch and record an outcome for every document in it.
///
/// Documents rejected with a transient status are sent again in a smaller
/// batch until the retries are used up. `may_have_applied[i]` is set once an
/// attempt for `documents[i]` failed without saying whether it was written.
async fn send_batch(
    client: Arc<dyn SearchEngineClient>,
    target: Arc<IndexTarget>,
    tracker: Arc<OutcomeTracker>,
    mut documents: Vec<SerializedDocument>,
    mode: WriteMode,
    retry: RetryPolicy,
) {
    let mut may_have_applied = vec![false; documents.len()];
    let mut attempt = 0;

    loop {
        match client.bulk_write(&target, &documents, mode).await {
            Ok(outcomes) => {
                let mut again = Vec::new();
                let mut again_applied = Vec::new();
                let items = documents.into_iter().zip(may_have_applied).zip(outcomes);
                for ((document, applied), outcome) in items {
                    match outcome.result {
                        Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                            again_applied.push(applied || e.may_have_applied());
                            again.push(document);
                        }
                        result => record_outcome(&tracker, mode, document.id, result, applied),
                    }
                }

                if again.is_empty() {
                    return;
                }
                may_have_applied = again_applied;
                let delay = retry.delay(attempt);
                warn!(
                    count = again.len(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Bulk items throttled, retrying"
                );
                tokio::time::sleep(delay).await;
                documents = again;
            }
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = retry.delay(attempt);
                warn!(
                    count = documents.len(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Bulk request failed, retrying"
                );
                if e.may_have_applied() {
                    may_have_applied.iter_mut().for_each(|applied| *applied = true);
                }
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(count = documents.len(), error = %e, "Bulk request failed");
                let cause = DocumentError::bulk_request(e.to_string());
                for document in documents {
                    tracker.record_failure(document.id, cause.clone());
                }
                return;
            }
        }
        attempt += 1;
    }
}

#[async_trait]
impl Loader for BatchLoader {
    async fn submit(&mut self, document: PageDocument) {
        self.submitted += 1;

        let serialized = match serialize_document(&document) {
            Ok(serialized) => serialized,
            Err(e) => {
                self.tracker.record_failure(document.identity(), e);
                return;
            }
        };

        self.pending_bytes += serialized.size();
        self.pending.push(serialized);

        if self.pending_bytes >= self.config.bulk_size_bytes {
            self.flush().await;
        }
    }

    async fn drain(&mut self, timeout: Duration) -> DrainStatus {
        let deadline = Instant::now() + timeout;
        info!(
            submitted = self.submitted,
            pending = self.pending.len(),
            batches = self.batches,
            "Draining batch loader"
        );

        if tokio::time::timeout_at(deadline, self.flush()).await.is_err() {
            warn!("Previous bulk request still running at drain deadline");
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        wait_for_outcomes(&self.tracker, self.submitted, remaining).await
    }

    fn tracker(&self) -> &Arc<OutcomeTracker> {
        &self.tracker
    }

    fn submitted(&self) -> u64 {
        self.submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockSearchClient;

    fn loader(client: Arc<MockSearchClient>, config: LoaderConfig) -> BatchLoader {
        BatchLoader::new(client, IndexTarget::new("dewiktionary"), config)
    }

    fn page(title: &str) -> PageDocument {
        PageDocument::from_text("Main", title, "a fruit")
    }

    #[tokio::test]
    async fn test_batches_flushed_by_size() {
        let client = Arc::new(MockSearchClient::new());
        let config = LoaderConfig {
            bulk_size_bytes: 1,
            ..Default::default()
        };
        let mut loader = loader(client.clone(), config);

        for title in ["apple", "banana", "cherry"] {
            loader.submit(page(title)).await;
        }
        let status = loader.drain(Duration::from_secs(5)).await;

        assert_eq!(status, DrainStatus::Completed);
        assert_eq!(client.bulk_calls(), 3);
        assert_eq!(loader.tracker().success_count(), 3);
    }

    #[tokio::test]
    async fn test_full_batch_waits_for_request_in_flight() {
        let client = Arc::new(MockSearchClient::new());
        client.hold_writes();
        let config = LoaderConfig {
            bulk_size_bytes: 1,
            ..Default::default()
        };
        let mut loader = loader(client.clone(), config);

        loader.submit(page("apple")).await;
        {
            let second = loader.submit(page("banana"));
            tokio::pin!(second);

            let waited = tokio::time::timeout(Duration::from_millis(50), &mut second).await;
            assert!(waited.is_err(), "second batch must wait for the first request");
            assert_eq!(client.bulk_calls(), 1);

            client.release_writes();
            second.await;
        }

        let status = loader.drain(Duration::from_secs(5)).await;
        assert_eq!(status, DrainStatus::Completed);
        assert_eq!(client.bulk_calls(), 2);
        assert_eq!(loader.tracker().success_count(), 2);
    }

    #[tokio::test]
    async fn test_small_batch_sent_on_drain() {
        let client = Arc::new(MockSearchClient::new());
        let mut loader = loader(client.clone(), LoaderConfig::default());

        loader.submit(page("apple")).await;
        loader.submit(page("banana")).await;
        assert_eq!(client.bulk_calls(), 0);

        loader.drain(Duration::from_secs(5)).await;
        assert_eq!(client.bulk_calls(), 1);
        assert_eq!(client.document_count("dewiktionary"), 2);
    }

    #[tokio::test]
    async fn test_duplicate_in_create_mode_is_conflict() {
        let client = Arc::new(MockSearchClient::new());
        let mut loader = loader(client.clone(), LoaderConfig::default());

        loader.submit(page("apple")).await;
        loader.submit(page("apple")).await;
        loader.drain(Duration::from_secs(5)).await;

        let summary = loader.summarize().unwrap();
        assert_eq!(summary.successes, 1);
        assert_eq!(summary.failures, 1);
        assert!(summary.failed["Main:apple"].is_conflict());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_request_is_retried() {
        let client = Arc::new(MockSearchClient::new());
        client.fail_next_writes(2);
        let mut loader = loader(client.clone(), LoaderConfig::default());

        loader.submit(page("apple")).await;
        loader.drain(Duration::from_secs(60)).await;

        assert_eq!(client.bulk_calls(), 3);
        assert_eq!(loader.tracker().success_count(), 1);
        assert_eq!(loader.tracker().failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_acknowledgement_is_not_reported_as_conflict() {
        let client = Arc::new(MockSearchClient::new());
        client.lose_next_acks(1);
        let mut loader = loader(client.clone(), LoaderConfig::default());

        loader.submit(page("apple")).await;
        loader.submit(page("banana")).await;
        loader.drain(Duration::from_secs(60)).await;

        assert_eq!(client.bulk_calls(), 2);
        assert_eq!(client.document_count("dewiktionary"), 2);
        let summary = loader.summarize().unwrap();
        assert_eq!(summary.successes, 2);
        assert_eq!(summary.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_request_records_every_document() {
        let client = Arc::new(MockSearchClient::new());
        client.fail_next_writes(10);
        let config = LoaderConfig {
            max_retries: 1,
            ..Default::default()
        };
        let mut loader = loader(client.clone(), config);

        loader.submit(page("apple")).await;
        loader.submit(page("banana")).await;
        let status = loader.drain(Duration::from_secs(60)).await;

        assert_eq!(status, DrainStatus::Completed);
        let summary = loader.summarize().unwrap();
        assert_eq!(summary.failures, 2);
        assert!(matches!(summary.failed["Main:banana"], DocumentError::BulkRequest(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_times_out_when_index_hangs() {
        let client = Arc::new(MockSearchClient::new());
        client.set_hang(true);
        let mut loader = loader(client.clone(), LoaderConfig::default());

        loader.submit(page("apple")).await;
        loader.submit(page("banana")).await;
        let status = loader.drain(Duration::from_secs(300)).await;

        assert_eq!(status, DrainStatus::TimedOut { outstanding: 2 });
    }
}
