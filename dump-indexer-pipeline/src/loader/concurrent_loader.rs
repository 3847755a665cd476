//! Loader issuing one write per document.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::loader::{
    record_outcome, serialize_document, wait_for_outcomes, DrainStatus, Loader, LoaderConfig,
};
use crate::tracker::OutcomeTracker;
use dump_indexer_repository::{IndexTarget, SearchEngineClient};
use dump_indexer_shared::PageDocument;

/// Loader that spawns a write task for every submitted document.
///
/// `submit` returns as soon as the task is spawned. The number of writes in
/// flight is not limited by the loader.
pub struct ConcurrentLoader {
    client: Arc<dyn SearchEngineClient>,
    target: Arc<IndexTarget>,
    config: LoaderConfig,
    tracker: Arc<OutcomeTracker>,
    submitted: u64,
}

impl ConcurrentLoader {
    pub fn new(client: Arc<dyn SearchEngineClient>, target: IndexTarget, config: LoaderConfig) -> Self {
        Self {
            client,
            target: Arc::new(target),
            config,
            tracker: Arc::new(OutcomeTracker::new()),
            submitted: 0,
        }
    }
}

#[async_trait]
impl Loader for ConcurrentLoader {
    async fn submit(&mut self, document: PageDocument) {
        self.submitted += 1;

        let serialized = match serialize_document(&document) {
            Ok(serialized) => serialized,
            Err(e) => {
                self.tracker.record_failure(document.identity(), e);
                return;
            }
        };

        let client = self.client.clone();
        let target = self.target.clone();
        let tracker = self.tracker.clone();
        let mode = self.config.write_mode;
        let retry = self.config.retry_policy();

        tokio::spawn(async move {
            let may_have_applied = AtomicBool::new(false);
            let result = {
                let (client, target, document, flag) =
                    (&client, &target, &serialized, &may_have_applied);
                retry
                    .run(&document.id, move || async move {
                        let result = client.write_document(target, document, mode).await;
                        if matches!(&result, Err(e) if e.may_have_applied()) {
                            flag.store(true, Ordering::Relaxed);
                        }
                        result
                    })
                    .await
            };

            record_outcome(
                &tracker,
                mode,
                serialized.id,
                result,
                may_have_applied.load(Ordering::Relaxed),
            );
        });
    }

    async fn drain(&mut self, timeout: Duration) -> DrainStatus {
        info!(
            submitted = self.submitted,
            settled = self.tracker.settled(),
            "Draining concurrent loader"
        );
        wait_for_outcomes(&self.tracker, self.submitted, timeout).await
    }

    fn tracker(&self) -> &Arc<OutcomeTracker> {
        &self.tracker
    }

    fn submitted(&self) -> u64 {
        self.submitted
    }
}
